//! Transport core for a recommendation service SDK: host availability,
//! request signing, the HTTP caller and telemetry reporting.

pub mod auth;
pub mod availability;
pub mod caller;
pub mod client;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use caller::{CallError, Options};
pub use client::{BuildError, Client, ClientBuilder};
pub use config::ClientConfig;
pub use lifecycle::Shutdown;
