//! Error types for the availability subsystem.
//!
//! Only construction can fail; background scoring and fetch errors are
//! logged and never returned.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("default hosts are empty")]
    EmptyHosts,

    #[error("host config has no '*' entry or it is empty")]
    MissingDefaultPath,

    #[error("project id is empty")]
    EmptyProjectId,
}
