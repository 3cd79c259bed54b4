//! Retry logic.
//!
//! # Responsibilities
//! - Bound the number of attempts of a background request
//! - Space attempts with jittered exponential backoff
//!
//! # Design Decisions
//! - Only background traffic retries (host-config fetch, metrics reports);
//!   a caller's `call` is never retried behind its back
//! - What counts as retryable is decided by the call site

use std::time::Duration;

use crate::resilience::backoff::calculate_backoff;

/// Attempt budget with backoff between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Create a new policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Return true if another attempt may follow `attempt` (1-based).
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after failed `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }
}
