//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, multiplier > 1, jitter in [0, 1])
//! - Validate addresses, paths and check URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MonitorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::MonitorConfig;
use crate::resilience::backoff::RetryPolicy;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
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

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = RetryPolicy::try_from(&config.retry) {
        errors.push(ValidationError::new("retry", e.to_string()));
    }

    check_addr(&mut errors, "server.bind_address", &config.server.bind_address);
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.exporter.enabled {
        check_addr(&mut errors, "exporter.bind_address", &config.exporter.bind_address);
        check_path(&mut errors, "exporter.path", &config.exporter.path);
        check_path(&mut errors, "exporter.process_path", &config.exporter.process_path);
        if config.exporter.path == config.exporter.process_path {
            errors.push(ValidationError::new(
                "exporter.process_path",
                "must differ from exporter.path",
            ));
        }
    }

    if config.fallback.buffer_capacity == 0 {
        errors.push(ValidationError::new(
            "fallback.buffer_capacity",
            "must be at least 1",
        ));
    }

    if config.probe.interval_secs > 0 && config.probe.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "probe.timeout_secs",
            "must be greater than zero when probing is enabled",
        ));
    }

    if config.health.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "health.timeout_secs",
            "must be greater than zero",
        ));
    }
    for (i, check) in config.health.checks.iter().enumerate() {
        if check.name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("health.checks[{}].name", i),
                "must not be empty",
            ));
        }
        match url::Url::parse(&check.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                format!("health.checks[{}].url", i),
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                format!("health.checks[{}].url", i),
                e.to_string(),
            )),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("'{}' is not a socket address", value),
        ));
    }
}

fn check_path(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if !value.starts_with('/') {
        errors.push(ValidationError::new(field, "must start with '/'"));
    }
}
