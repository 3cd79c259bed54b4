//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the chosen auth mode has its credentials
//! - Validate value ranges (intervals > 0, threshold in [0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before any background task is started

use std::fmt;

use crate::config::schema::ClientConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a client configuration, collecting every error found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.tenant_id.trim().is_empty() {
        errors.push(ValidationError::new("tenant_id", "tenant id is empty"));
    }

    let auth = &config.auth;
    if auth.use_air_auth {
        if is_blank(&auth.air_auth_token) {
            errors.push(ValidationError::new("auth.air_auth_token", "token is empty"));
        }
    } else if is_blank(&auth.access_key) || is_blank(&auth.secret_key) {
        errors.push(ValidationError::new(
            "auth.access_key",
            "access key or secret key is empty",
        ));
    }

    if config.region.trim().is_empty() {
        errors.push(ValidationError::new("region", "region is empty"));
    }

    let hosts = config.resolved_hosts();
    if hosts.is_empty() {
        errors.push(ValidationError::new(
            "hosts",
            format!(
                "default hosts are empty and region '{}' has no registered hosts",
                config.region
            ),
        ));
    }
    if hosts.iter().any(|h| h.trim().is_empty()) {
        errors.push(ValidationError::new("hosts", "host entries must not be blank"));
    }
    if matches!(&config.host_header, Some(h) if h.trim().is_empty()) {
        errors.push(ValidationError::new("host_header", "host header is blank"));
    }

    if config.schema != "http" && config.schema != "https" {
        errors.push(ValidationError::new(
            "schema",
            format!("unsupported schema '{}'", config.schema),
        ));
    }

    if let Some(project_id) = &config.project_id {
        if project_id.trim().is_empty() {
            errors.push(ValidationError::new("project_id", "project id is blank"));
        }
    }

    let availability = &config.availability;
    if availability.window_size == 0 {
        errors.push(ValidationError::new("availability.window_size", "must be at least 1"));
    }
    if availability.score_interval_ms == 0 {
        errors.push(ValidationError::new("availability.score_interval_ms", "must be > 0"));
    }
    if availability.fetch_interval_secs == 0 {
        errors.push(ValidationError::new("availability.fetch_interval_secs", "must be > 0"));
    }
    if availability.ping_timeout_ms == 0 {
        errors.push(ValidationError::new("availability.ping_timeout_ms", "must be > 0"));
    }
    if !(0.0..=1.0).contains(&availability.failure_rate_threshold) {
        errors.push(ValidationError::new(
            "availability.failure_rate_threshold",
            "must be within [0, 1]",
        ));
    }
    if !availability.ping_path.starts_with('/') {
        errors.push(ValidationError::new("availability.ping_path", "must start with '/'"));
    }

    if config.keep_alive && config.caller.ping_interval_secs == 0 {
        errors.push(ValidationError::new("caller.ping_interval_secs", "must be > 0"));
    }

    if config.metrics.queue_capacity == 0 {
        errors.push(ValidationError::new("metrics.queue_capacity", "must be at least 1"));
    }
    if config.metrics.batch_size == 0 {
        errors.push(ValidationError::new("metrics.batch_size", "must be at least 1"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
