//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Scoring pass (driven by availability::manager):
//!     hosts of the current HostConfig
//!     → probe.rs (GET <schema>://<host>/predict/api/ping, all hosts at once)
//!     → window.rs (record outcome per host)
//!     → scorer.rs (score = 1 - failure rate)
//!     → HostScore list back to the manager
//! ```
//!
//! # Design Decisions
//! - Windows start optimistic (all successes) so new hosts are not penalized
//! - A singleton host set is never probed; there is nothing to rank
//! - Probes run concurrently; outcomes are recorded under one lock afterwards
//! - One `Prober` serves both scoring and the caller's keepalive loop

pub mod probe;
pub mod scorer;
pub mod window;

pub use probe::Prober;
pub use scorer::{HostScore, HostScorer, PingHostScorer};
pub use window::Window;
