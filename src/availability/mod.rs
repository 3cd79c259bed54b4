//! Host availability subsystem.
//!
//! # Data Flow
//! ```text
//! default hosts → HostConfig {"*": hosts}
//!
//! Score loop (every score_interval):
//!     current HostConfig
//!     → health::HostScorer (probe + window)
//!     → stable sort per path by score
//!     → ArcSwap store if order changed
//!
//! Fetch loop (every fetch_interval, project id only):
//!     GET http://<best "*" host>/data/api/sdk/host?project_id=<id>
//!     → reject without "*" / keep on 404 / skip if same host sets
//!     → score and store
//!
//! Readers (caller, metrics, keepalive):
//!     HostSelector::get_host(path) → lock-free snapshot load
//! ```
//!
//! # Design Decisions
//! - Snapshots are swapped whole; readers never see a half-updated map
//! - Hosts are reordered, never removed; a degraded set is still served
//! - Background errors are logged, never returned to callers

pub mod error;
pub mod fetcher;
pub mod host_config;
pub mod manager;

pub use error::AvailabilityError;
pub use fetcher::{FetchResult, HostConfigFetcher};
pub use host_config::{HostConfig, DEFAULT_PATH};
pub use manager::{FetchOutcome, HostAvailabilityManager, HostSelector, ManagerState};
