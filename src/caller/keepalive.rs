//! Connection keepalive.
//!
//! Pings every known host on a fixed interval so pooled connections stay warm,
//! and counts each ping as a heartbeat.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::availability::HostSelector;
use crate::health::probe::Prober;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics::{tag, MetricsSink, HEARTBEAT_COUNT};

/// Keepalive loop over the caller's transport client.
pub struct Keepalive {
    prober: Prober,
    selector: Arc<dyn HostSelector>,
    interval: Duration,
    sink: MetricsSink,
}

impl Keepalive {
    /// Create a new keepalive loop. Heartbeats are tagged with the prober's
    /// project id.
    pub fn new(
        prober: Prober,
        selector: Arc<dyn HostSelector>,
        interval: Duration,
        sink: MetricsSink,
    ) -> Self {
        Self {
            prober,
            selector,
            interval,
            sink,
        }
    }

    /// Ping every host once. Returns the number of healthy replies.
    pub async fn beat(&self) -> usize {
        let mut healthy = 0;
        for host in self.selector.get_hosts() {
            self.sink.counter(
                HEARTBEAT_COUNT,
                1.0,
                vec![
                    "from:http_caller".to_string(),
                    tag("project_id", self.prober.project_id()),
                    tag("host", &host),
                ],
            );
            if self.prober.ping(&host).await {
                healthy += 1;
            }
        }
        healthy
    }

    /// Run until shutdown.
    pub fn spawn(self, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = self.interval.as_secs(), "Keepalive starting");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let healthy = self.beat().await;
                        tracing::debug!(healthy, "Keepalive round finished");
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Keepalive received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}
