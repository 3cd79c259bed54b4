//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Background request (host-config fetch, metrics report):
//!     → every request carries its own timeout
//!     → On retryable failure: retries.rs (attempt budget)
//!     → backoff.rs (jittered delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Background failures are retried and then dropped, never surfaced to calls

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
