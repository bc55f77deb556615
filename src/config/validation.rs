//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, bounded archive windows)
//! - Detect conflicting routing keys
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LogRoutingConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::LogRoutingConfig;

/// Upper bound on retained archives per key.
pub const MAX_ARCHIVE_WINDOWS: u32 = 20;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `router.idle_timeout_minutes`).
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &LogRoutingConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.router.idle_timeout_minutes == 0 {
        errors.push(ValidationError::new("router.idle_timeout_minutes", "must be greater than 0"));
    }
    if config.router.reap_interval_secs == Some(0) {
        errors.push(ValidationError::new("router.reap_interval_secs", "must be greater than 0"));
    }

    if config.local.max_file_size.bytes() == 0 {
        errors.push(ValidationError::new("local.max_file_size", "must be greater than 0"));
    }
    if config.local.max_archive_windows > MAX_ARCHIVE_WINDOWS {
        errors.push(ValidationError::new(
            "local.max_archive_windows",
            format!("must be at most {MAX_ARCHIVE_WINDOWS}"),
        ));
    }
    let file_name = config.local.file_name.trim();
    if file_name.is_empty() || file_name.contains(['/', '\\']) {
        errors.push(ValidationError::new("local.file_name", "must be a plain, non-empty file name"));
    }

    let mut seen = HashSet::new();
    for (field, key_name) in config.routes.named() {
        if key_name.trim().is_empty() {
            errors.push(ValidationError::new(format!("routes.{field}"), "must not be empty"));
        } else if !seen.insert(key_name) {
            errors.push(ValidationError::new(
                format!("routes.{field}"),
                format!("routing key {key_name:?} is used by another destination"),
            ));
        }
    }

    if config.remote.flush_interval_secs == 0 {
        errors.push(ValidationError::new("remote.flush_interval_secs", "must be greater than 0"));
    }
    if config.remote.max_concurrent_flushes == 0 {
        errors.push(ValidationError::new("remote.max_concurrent_flushes", "must be at least 1"));
    }
    if config.remote.retry.max_attempts == 0 {
        errors.push(ValidationError::new("remote.retry.max_attempts", "must be at least 1"));
    }
    if config.remote.retry.base_delay_ms > config.remote.retry.max_delay_ms {
        errors.push(ValidationError::new(
            "remote.retry.base_delay_ms",
            "must not exceed remote.retry.max_delay_ms",
        ));
    }

    if config.lifecycle.shutdown_grace_secs == 0 {
        errors.push(ValidationError::new("lifecycle.shutdown_grace_secs", "must be greater than 0"));
    }
    if config.remote.enabled && config.storage.root_dir.trim().is_empty() {
        errors.push(ValidationError::new("storage.root_dir", "required when remote.enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
