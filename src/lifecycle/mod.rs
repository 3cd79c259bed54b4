//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Client build:
//!     Validate config → Start availability loops → Start caller/metrics loops
//!
//! Client shutdown (shutdown.rs):
//!     Client::shutdown() → Shutdown::trigger()
//!     → every loop observes the signal at its next wakeup and exits
//! ```
//!
//! # Design Decisions
//! - One signal shared by every background task of a client
//! - Triggering is idempotent and may happen from any thread
//! - In-flight passes are allowed to finish; no new pass is scheduled

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
