//! Host availability manager.
//!
//! # Responsibilities
//! - Own the current `HostConfig` snapshot
//! - Re-score and reorder hosts on a fixed interval
//! - Pull path overrides from the management endpoint
//! - Serve the best host per path without blocking

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::availability::error::AvailabilityError;
use crate::availability::fetcher::{FetchResult, HostConfigFetcher};
use crate::availability::host_config::{HostConfig, DEFAULT_PATH};
use crate::config::AvailabilityConfig;
use crate::health::HostScorer;
use crate::lifecycle::Shutdown;

/// Read side of host availability, shared with the caller and metrics.
pub trait HostSelector: Send + Sync {
    /// Best host for `path`, falling back to the best `"*"` host.
    fn get_host(&self, path: &str) -> String;

    /// Every known host, each once.
    fn get_hosts(&self) -> Vec<String>;
}

/// Lifecycle state of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Running,
    Shutdown,
}

/// What a remote refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The fetched config was scored and replaced the current one.
    Applied,
    /// The fetched config has the same host sets as the current one.
    Unchanged,
    /// The server has no config for this project.
    NotFound,
    /// The fetched config was unusable.
    Rejected,
    /// All attempts failed.
    Exhausted,
    /// No project id, or fetching is turned off, or the manager is shut down.
    Skipped,
}

/// Ranks hosts per path and keeps the ranking fresh in the background.
pub struct HostAvailabilityManager {
    host_config: ArcSwap<HostConfig>,
    scorer: Arc<dyn HostScorer>,
    fetcher: Option<HostConfigFetcher>,
    score_interval: Duration,
    fetch_interval: Duration,
    failure_rate_threshold: f64,
    /// Serializes snapshot writers so a slow pass cannot clobber a newer one.
    update_lock: Mutex<()>,
    shutdown: Shutdown,
}

impl HostAvailabilityManager {
    /// Create a manager over `hosts`, run the first scoring pass and (with a
    /// fetcher) the first refresh, then start the background loops.
    pub async fn start(
        config: &AvailabilityConfig,
        hosts: Vec<String>,
        scorer: Arc<dyn HostScorer>,
        fetcher: Option<HostConfigFetcher>,
    ) -> Result<Arc<Self>, AvailabilityError> {
        let manager = Arc::new(Self::new(config, hosts, scorer, fetcher)?);

        manager.rescore().await;
        if manager.fetcher.is_some() {
            manager.refresh_from_server().await;
        }

        manager.spawn_score_loop();
        if manager.fetcher.is_some() {
            manager.spawn_fetch_loop();
        }

        tracing::info!(
            hosts = ?manager.get_hosts(),
            remote = manager.fetcher.is_some(),
            "Host availability manager started"
        );
        Ok(manager)
    }

    /// Create a manager without starting any loop.
    pub fn new(
        config: &AvailabilityConfig,
        hosts: Vec<String>,
        scorer: Arc<dyn HostScorer>,
        fetcher: Option<HostConfigFetcher>,
    ) -> Result<Self, AvailabilityError> {
        if let Some(fetcher) = &fetcher {
            if fetcher.project_id().is_empty() {
                return Err(AvailabilityError::EmptyProjectId);
            }
        }
        let initial = HostConfig::from_default_hosts(hosts)?;
        Ok(Self {
            host_config: ArcSwap::from_pointee(initial),
            scorer,
            fetcher,
            score_interval: config.score_interval(),
            fetch_interval: config.fetch_interval(),
            failure_rate_threshold: config.failure_rate_threshold,
            update_lock: Mutex::new(()),
            shutdown: Shutdown::new(),
        })
    }

    /// Current snapshot.
    pub fn host_config(&self) -> Arc<HostConfig> {
        self.host_config.load_full()
    }

    pub fn state(&self) -> ManagerState {
        if self.shutdown.is_triggered() {
            ManagerState::Shutdown
        } else {
            ManagerState::Running
        }
    }

    /// Stop both loops. Idempotent; the last snapshot keeps being served.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Re-score the current snapshot. Returns true if it was replaced.
    pub async fn rescore(&self) -> bool {
        if self.shutdown.is_triggered() {
            return false;
        }
        let _guard = self.update_lock.lock().await;
        let current = self.host_config.load_full();
        self.apply_scored(&current).await
    }

    /// Score `base` and install its reordering if it differs from the current
    /// snapshot. Returns true if the snapshot was replaced.
    pub async fn score_and_update(&self, base: &HostConfig) -> bool {
        if self.shutdown.is_triggered() {
            return false;
        }
        let _guard = self.update_lock.lock().await;
        self.apply_scored(base).await
    }

    /// Pull the project's config from the management endpoint and apply it.
    pub async fn refresh_from_server(&self) -> FetchOutcome {
        let Some(fetcher) = &self.fetcher else {
            return FetchOutcome::Skipped;
        };
        if self.shutdown.is_triggered() {
            return FetchOutcome::Skipped;
        }

        let host = self.get_host(DEFAULT_PATH);
        let fetched = match fetcher.fetch(&host).await {
            FetchResult::Fetched(config) => config,
            FetchResult::NotFound => return FetchOutcome::NotFound,
            FetchResult::Rejected => return FetchOutcome::Rejected,
            FetchResult::Exhausted => return FetchOutcome::Exhausted,
        };

        let _guard = self.update_lock.lock().await;
        if fetched.same_host_sets(&self.host_config.load()) {
            tracing::debug!(config = ?fetched.paths(), "Hosts from server are unchanged");
            return FetchOutcome::Unchanged;
        }
        if self.apply_scored(&fetched).await {
            FetchOutcome::Applied
        } else {
            FetchOutcome::Unchanged
        }
    }

    /// Caller must hold `update_lock`.
    async fn apply_scored(&self, base: &HostConfig) -> bool {
        let hosts = base.distinct_hosts();
        let scores = self.scorer.score_hosts(&hosts).await;
        tracing::debug!(scores = ?scores, "Scored hosts");
        if scores.is_empty() {
            tracing::error!(hosts = ?hosts, "Scoring hosts returned an empty list");
            return false;
        }

        if scores.len() > 1
            && scores
                .iter()
                .all(|s| 1.0 - s.score >= self.failure_rate_threshold)
        {
            tracing::warn!(
                threshold = self.failure_rate_threshold,
                scores = ?scores,
                "All hosts degraded, serving the full host set"
            );
        }

        let sorted = base.sorted_by_scores(&scores);
        let current = self.host_config.load();
        if **current == sorted {
            tracing::debug!("Host order unchanged");
            return false;
        }

        tracing::info!(
            new = ?sorted.paths(),
            old = ?current.paths(),
            "Installing new host config"
        );
        self.host_config.store(Arc::new(sorted));
        true
    }

    fn spawn_score_loop(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let mut signal = self.shutdown.subscribe();
        tokio::spawn(async move {
            let period = manager.score_interval;
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.rescore().await;
                    }
                    _ = signal.recv() => {
                        tracing::info!("Score loop received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        });
    }

    fn spawn_fetch_loop(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let mut signal = self.shutdown.subscribe();
        tokio::spawn(async move {
            let period = manager.fetch_interval;
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = manager.refresh_from_server().await;
                        tracing::debug!(outcome = ?outcome, "Host config refresh finished");
                    }
                    _ = signal.recv() => {
                        tracing::info!("Fetch loop received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        });
    }
}

impl HostSelector for HostAvailabilityManager {
    fn get_host(&self, path: &str) -> String {
        self.host_config.load().get_host(path).to_string()
    }

    fn get_hosts(&self) -> Vec<String> {
        self.host_config.load().distinct_hosts()
    }
}

impl std::fmt::Debug for HostAvailabilityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostAvailabilityManager")
            .field("host_config", &self.host_config.load_full())
            .field("remote", &self.fetcher.is_some())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HostScore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedScorer(HashMap<String, f64>);

    #[async_trait]
    impl HostScorer for FixedScorer {
        async fn score_hosts(&self, hosts: &[String]) -> Vec<HostScore> {
            hosts
                .iter()
                .map(|h| HostScore::new(h.clone(), self.0.get(h).copied().unwrap_or(0.0)))
                .collect()
        }
    }

    fn scorer(scores: &[(&str, f64)]) -> Arc<dyn HostScorer> {
        Arc::new(FixedScorer(
            scores.iter().map(|(h, s)| (h.to_string(), *s)).collect(),
        ))
    }

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_hosts_rejected() {
        let err = HostAvailabilityManager::new(
            &AvailabilityConfig::default(),
            Vec::new(),
            scorer(&[]),
            None,
        )
        .unwrap_err();
        assert_eq!(err, AvailabilityError::EmptyHosts);
    }

    #[tokio::test]
    async fn test_rescore_reorders_by_score() {
        let manager = HostAvailabilityManager::new(
            &AvailabilityConfig::default(),
            hosts(&["B", "A"]),
            scorer(&[("A", 1.0), ("B", 0.8333)]),
            None,
        )
        .unwrap();
        assert_eq!(manager.get_host("*"), "B");
        assert!(manager.rescore().await);
        assert_eq!(manager.get_host("*"), "A");
        assert_eq!(manager.get_host("Other"), "A");
        // Same order again: no swap.
        assert!(!manager.rescore().await);
    }

    #[tokio::test]
    async fn test_shutdown_makes_manager_inert() {
        let manager = HostAvailabilityManager::new(
            &AvailabilityConfig::default(),
            hosts(&["B", "A"]),
            scorer(&[("A", 1.0), ("B", 0.0)]),
            None,
        )
        .unwrap();
        manager.shutdown();
        manager.shutdown();
        assert_eq!(manager.state(), ManagerState::Shutdown);
        assert!(!manager.rescore().await);
        assert_eq!(manager.get_host("*"), "B");
        assert_eq!(manager.refresh_from_server().await, FetchOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_score_and_update_installs_path_overrides() {
        let manager = HostAvailabilityManager::new(
            &AvailabilityConfig::default(),
            hosts(&["A"]),
            scorer(&[("A", 1.0), ("B", 0.5), ("C", 1.0)]),
            None,
        )
        .unwrap();
        let fetched = HostConfig::new([
            ("*".to_string(), hosts(&["B", "A"])),
            ("Predict".to_string(), hosts(&["C"])),
        ])
        .unwrap();
        assert!(manager.score_and_update(&fetched).await);
        assert_eq!(manager.get_host("Predict"), "C");
        assert_eq!(manager.get_host("Other"), "A");
        assert_eq!(manager.get_hosts(), hosts(&["A", "B", "C"]));
    }

    #[tokio::test]
    async fn test_background_loop_stops_on_shutdown() {
        let mut config = AvailabilityConfig::default();
        config.score_interval_ms = 10;
        let manager = HostAvailabilityManager::start(
            &config,
            hosts(&["A", "B"]),
            scorer(&[("A", 0.0), ("B", 1.0)]),
            None,
        )
        .await
        .unwrap();
        assert_eq!(manager.get_host("*"), "B");
        manager.shutdown();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(manager.state(), ManagerState::Shutdown);
        assert_eq!(manager.get_host("*"), "B");
    }
}
