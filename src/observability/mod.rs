//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured, local)
//!     → metrics.rs MetricsSink (counter/timer/store, log events)
//!         → bounded queues (drop when full, never block)
//!         → flush task (aggregate, POST to reporting endpoints)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, installed by the binary)
//!     → Reporting endpoints (counter / general / log)
//!     → `metrics` facade recorder of the embedding app (pipeline health)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through call logs and reported log events
//! - Emitting is a non-blocking enqueue; aggregation happens at flush time

pub mod logging;
pub mod metrics;

pub use self::metrics::{pipeline, MetricsFlusher, MetricsReceiver, MetricsSink};
