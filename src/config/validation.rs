//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. All errors are
//! collected rather than stopping at the first one.

use std::net::SocketAddr;

use crate::config::schema::WebConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("static mount path {0:?} must start with '/'")]
    MountPath(String),

    #[error("static mount {0:?} has an empty directory")]
    EmptyStaticDir(String),

    #[error("view_engine must not be empty")]
    EmptyViewEngine,

    #[error("body_limit must be greater than zero")]
    ZeroBodyLimit,

    #[error("request_timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("invalid metrics_address {0:?}")]
    MetricsAddress(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &WebConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (mount, dir) in &config.static_dirs {
        if !mount.starts_with('/') {
            errors.push(ValidationError::MountPath(mount.clone()));
        }
        if dir.trim().is_empty() {
            errors.push(ValidationError::EmptyStaticDir(mount.clone()));
        }
    }

    if config.view_engine.trim().is_empty() {
        errors.push(ValidationError::EmptyViewEngine);
    }
    if config.body_limit == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
