//! Host ranking and remote host-config refresh against live mock hosts.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{host_of, mount_pong, quiet_availability, PING_PATH};
use rec_core::availability::{
    FetchOutcome, HostAvailabilityManager, HostConfigFetcher, HostSelector,
};
use rec_core::health::{HostScorer, PingHostScorer, Prober};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FETCH_PATH: &str = "/data/api/sdk/host";

fn scorer() -> Arc<dyn HostScorer> {
    let prober = Prober::new(
        reqwest::Client::new(),
        "http",
        PING_PATH,
        Duration::from_millis(300),
    );
    PingHostScorer::new(prober, 5).into_shared()
}

fn fetcher() -> HostConfigFetcher {
    HostConfigFetcher::new(reqwest::Client::new(), "project", Duration::from_millis(500), 2)
}

async fn mount_host_config(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(FETCH_PATH))
        .and(query_param("project_id", "project"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_healthy_host_moves_ahead_of_failing_one() {
    let failing = MockServer::start().await;
    let healthy = MockServer::start().await;
    mount_pong(&healthy).await;

    let manager = HostAvailabilityManager::start(
        &quiet_availability(),
        vec![host_of(&failing), host_of(&healthy)],
        scorer(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(manager.get_host("*"), host_of(&healthy));
    assert_eq!(manager.get_host("AnyPath"), host_of(&healthy));
    assert_eq!(
        manager.host_config().default_hosts(),
        &[host_of(&healthy), host_of(&failing)]
    );
    manager.shutdown();
}

#[tokio::test]
async fn test_single_host_is_never_probed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(0)
        .mount(&server)
        .await;

    let hosts = vec![host_of(&server)];
    let manager = HostAvailabilityManager::start(&quiet_availability(), hosts, scorer(), None)
        .await
        .unwrap();

    assert!(!manager.rescore().await);
    assert_eq!(manager.get_host("*"), host_of(&server));
    manager.shutdown();
}

#[tokio::test]
async fn test_remote_config_overrides_paths() {
    let primary = MockServer::start().await;
    let predict = MockServer::start().await;
    mount_pong(&primary).await;
    mount_pong(&predict).await;
    mount_host_config(
        &primary,
        json!({ "*": [host_of(&primary)], "Predict": [host_of(&predict)] }),
    )
    .await;

    let manager = HostAvailabilityManager::start(
        &quiet_availability(),
        vec![host_of(&primary)],
        scorer(),
        Some(fetcher()),
    )
    .await
    .unwrap();

    assert_eq!(manager.get_host("Predict"), host_of(&predict));
    assert_eq!(manager.get_host("Other"), host_of(&primary));
    assert_eq!(manager.refresh_from_server().await, FetchOutcome::Unchanged);
    manager.shutdown();
}

#[tokio::test]
async fn test_config_without_default_path_is_rejected() {
    let primary = MockServer::start().await;
    mount_pong(&primary).await;
    mount_host_config(&primary, json!({ "Predict": ["elsewhere.example.com"] })).await;

    let manager = HostAvailabilityManager::start(
        &quiet_availability(),
        vec![host_of(&primary)],
        scorer(),
        Some(fetcher()),
    )
    .await
    .unwrap();

    assert_eq!(manager.refresh_from_server().await, FetchOutcome::Rejected);
    assert_eq!(manager.get_host("Predict"), host_of(&primary));
    manager.shutdown();
}

#[tokio::test]
async fn test_config_with_empty_default_path_is_rejected() {
    let primary = MockServer::start().await;
    mount_host_config(&primary, json!({ "*": [] })).await;

    let manager = HostAvailabilityManager::new(
        &quiet_availability(),
        vec![host_of(&primary)],
        scorer(),
        Some(fetcher()),
    )
    .unwrap();

    assert_eq!(manager.refresh_from_server().await, FetchOutcome::Rejected);
    assert_eq!(manager.get_host("*"), host_of(&primary));
}

#[tokio::test]
async fn test_not_found_keeps_defaults() {
    let primary = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FETCH_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&primary)
        .await;

    let manager = HostAvailabilityManager::new(
        &quiet_availability(),
        vec![host_of(&primary)],
        scorer(),
        Some(fetcher()),
    )
    .unwrap();

    assert_eq!(manager.refresh_from_server().await, FetchOutcome::NotFound);
    assert_eq!(manager.get_hosts(), vec![host_of(&primary)]);
}

#[tokio::test]
async fn test_server_errors_are_retried_then_given_up() {
    let primary = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FETCH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&primary)
        .await;

    let manager = HostAvailabilityManager::new(
        &quiet_availability(),
        vec![host_of(&primary)],
        scorer(),
        Some(fetcher()),
    )
    .unwrap();

    assert_eq!(manager.refresh_from_server().await, FetchOutcome::Exhausted);
    assert_eq!(manager.get_host("*"), host_of(&primary));
}

#[tokio::test]
async fn test_refresh_after_shutdown_is_skipped() {
    let primary = MockServer::start().await;
    let manager = HostAvailabilityManager::new(
        &quiet_availability(),
        vec![host_of(&primary)],
        scorer(),
        Some(fetcher()),
    )
    .unwrap();

    manager.shutdown();
    manager.shutdown();
    assert_eq!(manager.refresh_from_server().await, FetchOutcome::Skipped);
    assert!(primary.received_requests().await.unwrap_or_default().is_empty());
}
