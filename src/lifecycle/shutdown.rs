//! Shutdown coordination for background loops.

use tokio::sync::watch;

/// Coordinator for stopping every periodic task owned by a client.
///
/// A task that subscribes after the trigger still sees it. Triggering twice
/// is harmless.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal { rx: self.tx.subscribe() }
    }

    /// Trigger the shutdown signal. Safe to call more than once.
    pub fn trigger(&self) {
        let already = self.tx.send_replace(true);
        if !already {
            tracing::debug!(subscribers = self.tx.receiver_count(), "Shutdown triggered");
        }
    }

    /// Whether shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half handed to each background task.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown has been triggered.
    ///
    /// Also resolves if the coordinator was dropped, so an orphaned loop
    /// cannot outlive its client.
    pub async fn recv(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    /// Non-blocking check, used at the top of each loop iteration.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_is_idempotent() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();

        shutdown.trigger();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_millis(100), signal.recv())
            .await
            .expect("signal should resolve after trigger");
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let mut late = shutdown.subscribe();
        assert!(late.is_triggered());
        tokio::time::timeout(Duration::from_millis(100), late.recv())
            .await
            .expect("late subscriber should not block");
    }

    #[tokio::test]
    async fn test_dropped_coordinator_releases_waiters() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        drop(shutdown);

        tokio::time::timeout(Duration::from_millis(100), signal.recv())
            .await
            .expect("dropping the sender should release the waiter");
    }
}
