//! Active health probe.
//!
//! # Responsibilities
//! - Issue one GET against a host's ping endpoint
//! - Decide success from status and body
//! - Report each outcome to the metrics sink

use std::time::{Duration, Instant};

use reqwest::header::HOST;

use crate::observability::metrics::MetricsSink;

/// Longest body still accepted as a ping reply.
const MAX_PONG_LEN: usize = 20;

/// Prefix of the request id carried by pings.
pub const PING_REQUEST_ID_PREFIX: &str = "ping_";

/// Build the probe URL for a host.
pub fn ping_url(schema: &str, host: &str, path: &str) -> String {
    format!("{}://{}{}", schema, host, path)
}

/// Return true if a ping reply signals a healthy host.
pub fn is_ping_success(status: reqwest::StatusCode, body: &[u8]) -> bool {
    if status != reqwest::StatusCode::OK || body.is_empty() || body.len() >= MAX_PONG_LEN {
        return false;
    }
    String::from_utf8_lossy(body).contains("pong")
}

/// Pings hosts over a shared transport client.
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
    schema: String,
    path: String,
    timeout: Duration,
    host_header: Option<String>,
    project_id: String,
    sink: MetricsSink,
}

impl Prober {
    pub fn new(
        client: reqwest::Client,
        schema: impl Into<String>,
        path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            schema: schema.into(),
            path: path.into(),
            timeout,
            host_header: None,
            project_id: String::new(),
            sink: MetricsSink::disabled(),
        }
    }

    /// Override the `Host` header of every ping.
    pub fn with_host_header(mut self, host_header: Option<String>) -> Self {
        self.host_header = host_header.filter(|h| !h.is_empty());
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_sink(mut self, sink: MetricsSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Ping `host` once. Every failure is logged and reported as `false`.
    pub async fn ping(&self, host: &str) -> bool {
        let url = ping_url(&self.schema, host, &self.path);
        let request_id = format!("{PING_REQUEST_ID_PREFIX}{}", uuid::Uuid::new_v4());
        let project_id = &self.project_id;

        let mut request = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header("Request-Id", &request_id)
            .header("Project-Id", project_id);
        if let Some(host_header) = &self.host_header {
            request = request.header(HOST, host_header);
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let cost_ms = start.elapsed().as_millis() as u64;
                self.sink.warn(
                    &request_id,
                    format!(
                        "ping find err, project_id:{project_id}, host:{host}, \
                         cost:{cost_ms}ms, err:{e}"
                    ),
                );
                tracing::warn!(
                    host = %host,
                    request_id = %request_id,
                    cost_ms,
                    error = %e,
                    "Ping failed: transport error"
                );
                return false;
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                self.sink.warn(
                    &request_id,
                    format!("ping find err, project_id:{project_id}, host:{host}, err:{e}"),
                );
                tracing::warn!(host = %host, error = %e, "Ping failed: unreadable body");
                return false;
            }
        };

        let cost_ms = start.elapsed().as_millis() as u64;
        if is_ping_success(status, &body) {
            self.sink.info(
                &request_id,
                format!("ping success, project_id:{project_id}, host:{host}, cost:{cost_ms}ms"),
            );
            tracing::debug!(host = %host, cost_ms, "Ping succeeded");
            true
        } else {
            self.sink.warn(
                &request_id,
                format!(
                    "ping fail, project_id:{project_id}, host:{host}, \
                     cost:{cost_ms}ms, status:{}",
                    status.as_u16()
                ),
            );
            tracing::warn!(
                host = %host,
                cost_ms,
                status = %status,
                "Ping failed: unexpected reply"
            );
            false
        }
    }
}
