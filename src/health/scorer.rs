//! Host scoring.
//!
//! # Responsibilities
//! - Probe every host of a scoring pass
//! - Feed outcomes into the per-host windows
//! - Turn window failure rates into scores

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::health::probe::Prober;
use crate::health::window::Window;

/// Reachability score of one host, in `[0, 1]` (1 = no observed failures).
#[derive(Debug, Clone, PartialEq)]
pub struct HostScore {
    pub host: String,
    pub score: f64,
}

impl HostScore {
    pub fn new(host: impl Into<String>, score: f64) -> Self {
        Self {
            host: host.into(),
            score,
        }
    }
}

/// Produces one score per host for a scoring pass.
#[async_trait]
pub trait HostScorer: Send + Sync {
    async fn score_hosts(&self, hosts: &[String]) -> Vec<HostScore>;
}

/// Scorer backed by active pings and a sliding window per host.
pub struct PingHostScorer {
    prober: Prober,
    window_size: usize,
    windows: Mutex<HashMap<String, Window>>,
}

impl PingHostScorer {
    /// Create a new ping scorer.
    pub fn new(prober: Prober, window_size: usize) -> Self {
        Self {
            prober,
            window_size,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn into_shared(self) -> Arc<dyn HostScorer> {
        Arc::new(self)
    }

    /// Record an outcome for a host without probing.
    pub fn record(&self, host: &str, success: bool) {
        let mut windows = self.lock_windows();
        self.window_entry(&mut windows, host).put(success);
    }

    /// Current failure rate of a host, if it has a window.
    pub fn failure_rate(&self, host: &str) -> Option<f64> {
        self.lock_windows().get(host).map(Window::failure_rate)
    }

    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        // A panic while holding the lock leaves the counts intact.
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn window_entry<'a>(
        &self,
        windows: &'a mut HashMap<String, Window>,
        host: &str,
    ) -> &'a mut Window {
        windows
            .entry(host.to_string())
            .or_insert_with(|| Window::new(self.window_size))
    }
}

#[async_trait]
impl HostScorer for PingHostScorer {
    async fn score_hosts(&self, hosts: &[String]) -> Vec<HostScore> {
        tracing::debug!(hosts = ?hosts, "Scoring hosts");

        // Hosts dropped from the set lose their history.
        self.lock_windows().retain(|host, _| hosts.contains(host));

        // Nothing to rank in a singleton set.
        if hosts.len() == 1 {
            return vec![HostScore::new(hosts[0].clone(), 0.0)];
        }

        let outcomes = join_all(hosts.iter().map(|host| self.prober.ping(host))).await;

        let mut windows = self.lock_windows();
        hosts
            .iter()
            .zip(outcomes)
            .map(|(host, success)| {
                let window = self.window_entry(&mut windows, host);
                window.put(success);
                let score = 1.0 - window.failure_rate();
                metrics::gauge!("rec_host_score", "host" => host.clone()).set(score);
                HostScore::new(host.clone(), score)
            })
            .collect()
    }
}
