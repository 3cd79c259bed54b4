//! Shared utilities for integration tests.

#![allow(dead_code)]

use rec_core::config::{AvailabilityConfig, ClientConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PING_PATH: &str = "/predict/api/ping";

/// `host:port` of a mock server, as used in host lists.
pub fn host_of(server: &MockServer) -> String {
    server.address().to_string()
}

/// Answer pings on `server` with a healthy reply.
pub async fn mount_pong(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(PING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(server)
        .await;
}

/// Availability settings with loops slow enough to stay out of a test's way.
pub fn quiet_availability() -> AvailabilityConfig {
    AvailabilityConfig {
        score_interval_ms: 60_000,
        fetch_interval_secs: 600,
        ping_timeout_ms: 300,
        window_size: 5,
        fetch_timeout_ms: 500,
        fetch_max_attempts: 2,
        fetch_hosts_from_server: false,
        ..AvailabilityConfig::default()
    }
}

/// A valid plain-http client config over `hosts`.
pub fn client_config(hosts: Vec<String>) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.tenant_id = "tenant".into();
    config.project_id = Some("project".into());
    config.region = "cn-north-1".into();
    config.schema = "http".into();
    config.hosts = hosts;
    config.auth.access_key = Some("ak".into());
    config.auth.secret_key = Some("sk".into());
    config.availability = quiet_availability();
    config
}
