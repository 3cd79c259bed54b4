//! Error types for calls.
//!
//! Transport failures never leak as raw `reqwest` errors; every failure is
//! classified into one of the variants below.

use std::error::Error as StdError;

use thiserror::Error;

/// Marker carried by transport-level failures.
pub const NET_ERR_MARK: &str = "[netErr]";

/// Errors that can occur while executing a call.
#[derive(Debug, Error)]
pub enum CallError {
    /// The request did not complete within its deadline.
    #[error("[netErr] timeout calling {url}")]
    Timeout { url: String },

    /// Connection-level failure (DNS, refused, reset, TLS).
    #[error("[netErr] network error calling {url}: {}", root_cause(.source))]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status other than 200.
    #[error("HTTP {status} calling {url}")]
    Status {
        url: String,
        status: u16,
        /// Decompressed response body, when one was readable.
        body: Option<String>,
    },

    /// The response used a content encoding we cannot decode, or decoding failed.
    #[error("encoding error calling {url}: {message}")]
    Encoding { url: String, message: String },

    /// Request or response payload (de)serialization failed.
    #[error("serialization error calling {url}: {source}")]
    Serialization {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request could not be built or signed.
    #[error("invalid request for {url}: {message}")]
    InvalidRequest { url: String, message: String },
}

impl CallError {
    /// Classify a transport error: timeouts by kind or message, the rest as
    /// network errors. The request URL never takes part in the message check.
    pub fn from_transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        let source = source.without_url();
        if source.is_timeout() || mentions_timeout(&source) {
            CallError::Timeout { url }
        } else {
            CallError::Network { url, source }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout { .. })
    }

    /// Return true for transport-level failures (timeout or network).
    pub fn is_net_error(&self) -> bool {
        matches!(self, CallError::Timeout { .. } | CallError::Network { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CallError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Tag value used for the `common.err` counter.
    pub fn metric_type(&self) -> &'static str {
        match self {
            CallError::Timeout { .. } => "request_timeout",
            CallError::Network { .. } => "request_occur_err",
            CallError::Status { .. } => "rsp_status_not_ok",
            CallError::Encoding { .. } => "decompress_response_fail",
            CallError::Serialization { .. } => "serialize_fail",
            CallError::InvalidRequest { .. } => "build_request_fail",
        }
    }
}

/// `err` followed by every error in its source chain.
fn chain(err: &reqwest::Error) -> impl Iterator<Item = &(dyn StdError + 'static)> {
    std::iter::successors(Some(err as &(dyn StdError + 'static)), |&e| e.source())
}

fn mentions_timeout(err: &reqwest::Error) -> bool {
    chain(err).any(|e| e.to_string().to_ascii_lowercase().contains("timeout"))
}

/// Message of the innermost error, e.g. "Connection refused (os error 111)".
fn root_cause(err: &reqwest::Error) -> String {
    chain(err)
        .last()
        .map(ToString::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_is_not_net_error() {
        let err = CallError::Status {
            url: "u".into(),
            status: 500,
            body: Some("oops".into()),
        };
        assert!(!err.is_net_error());
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "HTTP 500 calling u");
    }

    #[test]
    fn test_timeout_carries_marker() {
        let err = CallError::Timeout { url: "u".into() };
        assert!(err.is_timeout());
        assert!(err.is_net_error());
        assert!(err.to_string().contains(NET_ERR_MARK));
        assert_eq!(err.metric_type(), "request_timeout");
    }

    #[tokio::test]
    async fn test_refused_connection_with_timeout_in_url_is_network_error() {
        let url = "http://127.0.0.1:1/api?timeout_ms=100";
        let source = reqwest::Client::new()
            .get(url)
            .send()
            .await
            .expect_err("port 1 refuses connections");

        let err = CallError::from_transport(url, source);
        assert!(matches!(err, CallError::Network { .. }), "{err:?}");
        assert!(!err.is_timeout());
        assert!(err.is_net_error());
        let message = err.to_string();
        assert!(message.starts_with(NET_ERR_MARK));
        assert!(message.to_lowercase().contains("refused"), "{message}");
    }
}
