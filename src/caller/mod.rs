//! HTTP caller subsystem.
//!
//! # Data Flow
//! ```text
//! call(path, body, Options)
//!     → HostSelector::get_host(path) → endpoint.rs (schema://host/path)
//!     → headers (content type, tenant/project, request id, gzip, extras)
//!     → endpoint.rs (append per-call queries)
//!     → codec.rs (gzip body)
//!     → auth::Authenticator::sign
//!     → reqwest send with deadline
//!     → classify: Timeout / Network / Status / Encoding
//!     → codec.rs (gunzip response)
//!     → metrics (request.total.cost, request.count, common.err)
//!
//! keepalive.rs (optional):
//!     every ping_interval → ping each HostSelector::get_hosts() host
//! ```
//!
//! # Design Decisions
//! - One transport client per client, shared by calls, probes and reports
//! - Calls are never retried; the caller decides
//! - Errors are classified, raw transport errors never escape

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod http_caller;
pub mod keepalive;
pub mod options;
pub mod status;

pub use endpoint::UrlCenter;
pub use error::CallError;
pub use http_caller::{build_http_client, HttpCaller};
pub use keepalive::Keepalive;
pub use options::Options;
