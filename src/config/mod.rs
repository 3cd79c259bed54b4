//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or ClientBuilder
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → copied into each subsystem when the client is built
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a client is built
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod region;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use region::{RegionConfig, RegionError, RegionTable};
pub use schema::{
    AuthConfig, AvailabilityConfig, CallerConfig, ClientConfig, MetricsConfig,
    ObservabilityConfig,
};
pub use validation::{validate_config, ValidationError};
