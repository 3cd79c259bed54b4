//! Remote host-config fetcher.
//!
//! # Responsibilities
//! - GET the project's path → hosts map from the management endpoint
//! - Retry transport failures and bad statuses with backoff
//! - Reject maps without a usable `"*"` entry

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::availability::host_config::HostConfig;
use crate::resilience::RetryPolicy;

const FETCH_PATH: &str = "/data/api/sdk/host";
const BACKOFF_BASE_MS: u64 = 100;
const BACKOFF_MAX_MS: u64 = 1000;

/// Result of one refresh attempt cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// A well-formed config came back.
    Fetched(HostConfig),
    /// The server has no config for this project; keep the defaults.
    NotFound,
    /// The server answered with something unusable.
    Rejected,
    /// Every attempt failed.
    Exhausted,
}

/// Fetches host configs for one project.
#[derive(Debug, Clone)]
pub struct HostConfigFetcher {
    client: reqwest::Client,
    project_id: String,
    timeout: Duration,
    policy: RetryPolicy,
}

enum Attempt {
    Done(FetchResult),
    Retry,
}

impl HostConfigFetcher {
    /// Create a new fetcher.
    pub fn new(
        client: reqwest::Client,
        project_id: impl Into<String>,
        timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            timeout,
            policy: RetryPolicy::new(max_attempts, BACKOFF_BASE_MS, BACKOFF_MAX_MS),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Management endpoint URL, reached through `host`.
    pub fn url(&self, host: &str) -> String {
        format!("http://{}{}?project_id={}", host, FETCH_PATH, self.project_id)
    }

    /// Fetch the host config through `host`.
    pub async fn fetch(&self, host: &str) -> FetchResult {
        let url = self.url(host);
        let mut attempt = 1;
        loop {
            if let Attempt::Done(result) = self.fetch_once(&url).await {
                return result;
            }
            if !self.policy.has_next(attempt) {
                tracing::warn!(
                    url = %url,
                    attempts = attempt,
                    "Fetch host config failed after retries"
                );
                return FetchResult::Exhausted;
            }
            tokio::time::sleep(self.policy.delay_after(attempt)).await;
            attempt += 1;
        }
    }

    async fn fetch_once(&self, url: &str) -> Attempt {
        let start = Instant::now();
        let response = match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    url = %url,
                    cost_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Fetch host config failed: transport error"
                );
                return Attempt::Retry;
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(url = %url, "Fetch host config returned not found, keeping defaults");
            return Attempt::Done(FetchResult::NotFound);
        }
        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, "Fetch host config returned bad status");
            return Attempt::Retry;
        }

        let body = match response.bytes().await {
            Ok(body) if !body.is_empty() => body,
            Ok(_) => {
                tracing::warn!(url = %url, "Fetch host config returned empty body");
                return Attempt::Retry;
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Fetch host config body read failed");
                return Attempt::Retry;
            }
        };
        tracing::debug!(
            url = %url,
            cost_ms = start.elapsed().as_millis() as u64,
            body = %String::from_utf8_lossy(&body),
            "Fetched host config"
        );

        Attempt::Done(parse_host_config(url, &body))
    }
}

fn parse_host_config(url: &str, body: &[u8]) -> FetchResult {
    let paths: HashMap<String, Vec<String>> = match serde_json::from_slice(body) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Host config from server is malformed");
            return FetchResult::Rejected;
        }
    };
    match HostConfig::new(paths) {
        Ok(config) => FetchResult::Fetched(config),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Host config from server has no default hosts");
            FetchResult::Rejected
        }
    }
}
