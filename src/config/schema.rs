//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a client.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::region::RegionTable;

/// Root configuration for a transport client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Tenant identifier sent with every call and used by air auth.
    pub tenant_id: String,

    /// Project identifier; enables fetching host config from the server.
    pub project_id: Option<String>,

    /// Region of the client. Names the region defaults, and is the HMAC
    /// credential region unless the defaults say otherwise.
    pub region: String,

    /// Default hosts, best first. Empty means the region's registered hosts.
    pub hosts: Vec<String>,

    /// Region defaults available to this client.
    pub regions: RegionTable,

    /// `Host` header sent on calls and pings instead of the URL host.
    pub host_header: Option<String>,

    /// URL schema for calls and probes ("http" or "https").
    pub schema: String,

    /// Keep pooled connections warm by pinging every known host.
    pub keep_alive: bool,

    /// Headers added to every call.
    pub headers: HashMap<String, String>,

    /// Authentication settings.
    pub auth: AuthConfig,

    /// HTTP caller settings.
    pub caller: CallerConfig,

    /// Host availability settings.
    pub availability: AvailabilityConfig,

    /// Telemetry pipeline settings.
    pub metrics: MetricsConfig,

    /// Logging settings (consumed by the binary).
    pub observability: ObservabilityConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            project_id: None,
            region: String::new(),
            hosts: Vec::new(),
            regions: RegionTable::default(),
            host_header: None,
            schema: "https".to_string(),
            keep_alive: false,
            headers: HashMap::new(),
            auth: AuthConfig::default(),
            caller: CallerConfig::default(),
            availability: AvailabilityConfig::default(),
            metrics: MetricsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Hosts the client starts with: the explicit list, else the region's.
    pub fn resolved_hosts(&self) -> Vec<String> {
        if self.hosts.is_empty() {
            self.regions.hosts(&self.region).to_vec()
        } else {
            self.hosts.clone()
        }
    }

    /// Region placed in the HMAC signing scope.
    pub fn credential_region(&self) -> &str {
        self.regions.credential_region(&self.region)
    }
}

/// Authentication configuration. Exactly one mode is active per client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Use token based signing instead of access/secret keys.
    pub use_air_auth: bool,

    /// Shared token for air auth.
    pub air_auth_token: Option<String>,

    /// Access key id for HMAC signing.
    pub access_key: Option<String>,

    /// Secret key for HMAC signing.
    pub secret_key: Option<String>,

    /// Optional session token, sent as `X-Security-Token`.
    pub session_token: Option<String>,

    /// Service name in the HMAC signing scope.
    pub service: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            use_air_auth: false,
            air_auth_token: None,
            access_key: None,
            secret_key: None,
            session_token: None,
            service: "air".to_string(),
        }
    }
}

/// HTTP caller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallerConfig {
    /// How long an idle pooled connection is kept, in seconds.
    pub keep_alive_secs: u64,

    /// Keepalive ping interval in seconds.
    pub ping_interval_secs: u64,

    /// Maximum idle connections kept per host.
    pub max_connections: usize,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Call timeout used when the per-call options carry none.
    pub default_timeout_ms: u64,

    /// Timeout of a single keepalive ping.
    pub ping_timeout_ms: u64,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: 60,
            ping_interval_secs: 45,
            max_connections: 64,
            connect_timeout_ms: 1000,
            default_timeout_ms: 5000,
            ping_timeout_ms: 500,
        }
    }
}

impl CallerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// Host availability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Re-scoring interval in milliseconds.
    pub score_interval_ms: u64,

    /// Remote refresh interval in seconds.
    pub fetch_interval_secs: u64,

    /// Path of the health endpoint on every host.
    pub ping_path: String,

    /// Timeout of a single probe in milliseconds.
    pub ping_timeout_ms: u64,

    /// Number of recent probe outcomes remembered per host.
    pub window_size: usize,

    /// Failure rate at which a host counts as degraded.
    pub failure_rate_threshold: f64,

    /// Timeout of a single host-config fetch in milliseconds.
    pub fetch_timeout_ms: u64,

    /// Attempts per refresh before giving up until the next interval.
    pub fetch_max_attempts: u32,

    /// Fetch host config from the server when a project id is set.
    pub fetch_hosts_from_server: bool,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            score_interval_ms: 1000,
            fetch_interval_secs: 10,
            ping_path: "/predict/api/ping".to_string(),
            ping_timeout_ms: 300,
            window_size: 60,
            failure_rate_threshold: 0.1,
            fetch_timeout_ms: 5000,
            fetch_max_attempts: 3,
            fetch_hosts_from_server: true,
        }
    }
}

impl AvailabilityConfig {
    pub fn score_interval(&self) -> Duration {
        Duration::from_millis(self.score_interval_ms)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Telemetry pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Ship metric events to the reporting endpoints.
    pub enabled: bool,

    /// Ship log events as well.
    pub report_logs: bool,

    /// Prefix prepended to every metric name.
    pub prefix: String,

    /// Flush interval in seconds (values below 1 are raised to 1).
    pub flush_interval_secs: u64,

    /// Capacity of each of the two event queues.
    pub queue_capacity: usize,

    /// Maximum events drained from a queue per flush.
    pub batch_size: usize,

    /// Timeout of a single report request.
    pub http_timeout_ms: u64,

    /// Attempts per report; only timeouts are retried.
    pub max_try_times: u32,

    /// Endpoint for counter records.
    pub counter_path: String,

    /// Endpoint for timer and store records.
    pub general_path: String,

    /// Endpoint for log records.
    pub log_path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            report_logs: false,
            prefix: "rec.sdk".to_string(),
            flush_interval_secs: 10,
            queue_capacity: 10_000,
            batch_size: 1000,
            http_timeout_ms: 800,
            max_try_times: 2,
            counter_path: "/api/counter".to_string(),
            general_path: "/api/put".to_string(),
            log_path: "/api/log".to_string(),
        }
    }
}

impl MetricsConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
