//! Per-call options.

use std::time::Duration;

/// Options of one call. Built fresh per call, never shared.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Request id; a UUID is generated when absent.
    pub request_id: Option<String>,
    /// Client-side deadline; the caller's default applies when absent.
    pub timeout: Option<Duration>,
    /// Processing budget hinted to the server via `Timeout-Millis`.
    pub server_timeout: Option<Duration>,
    /// Extra headers, applied after the standard ones.
    pub headers: Vec<(String, String)>,
    /// Extra query parameters, appended in insertion order.
    pub queries: Vec<(String, String)>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = Some(timeout);
        self
    }

    /// Add a header; a later value for the same name wins.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Add a query parameter; a later value for the same name wins.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.queries.retain(|(k, _)| *k != key);
        self.queries.push((key, value.into()));
        self
    }
}
