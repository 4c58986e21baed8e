//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Unique, non-empty service names
//! - Parsable `http://` URLs for services and instances
//! - Validate value ranges (timeouts > 0, thresholds > 0, weights > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use url::Url;
use crate::config::schema::{GatewayConfig, ServiceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service at index {0} has an empty name")]
    EmptyServiceName(usize),

    #[error("service '{0}' is defined more than once")]
    DuplicateService(String),

    #[error("service '{service}' has invalid url '{url}': {reason}")]
    InvalidUrl {
        service: String,
        url: String,
        reason: String,
    },

    #[error("service '{0}' health path must start with '/'")]
    InvalidHealthPath(String),

    #[error("{field} must be greater than zero")]
    NonPositive { field: String },
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let globals = [
        ("proxy.timeout_ms", config.proxy.timeout_ms),
        ("proxy.max_body_bytes", config.proxy.max_body_bytes as u64),
        ("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold as u64),
        ("circuit_breaker.success_threshold", config.circuit_breaker.success_threshold as u64),
        ("circuit_breaker.timeout_ms", config.circuit_breaker.timeout_ms),
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_ms", config.health_check.timeout_ms),
        ("load_balancer.cleanup_interval_secs", config.load_balancer.cleanup_interval_secs),
    ];
    for (field, value) in globals {
        if value == 0 {
            errors.push(ValidationError::NonPositive { field: field.to_string() });
        }
    }

    let mut seen = HashSet::new();
    for (index, service) in config.services.iter().enumerate() {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName(index));
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        validate_service(service, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one service registered at runtime.
pub fn validate_service_config(service: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    if service.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName(0));
    }
    validate_service(service, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate an instance URL added at runtime.
pub fn validate_instance_url(service: &str, url: &str) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    check_url(service, url, &mut errors);
    match errors.pop() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn validate_service(service: &ServiceConfig, errors: &mut Vec<ValidationError>) {
    check_url(&service.name, &service.base_url, errors);
    for instance in &service.instances {
        check_url(&service.name, &instance.url, errors);
        if instance.weight == 0 {
            errors.push(ValidationError::NonPositive {
                field: format!("services.{}.instances.weight", service.name),
            });
        }
    }

    if !service.health_path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(service.name.clone()));
    }

    let overrides = [
        ("timeout_ms", service.timeout_ms),
        ("circuit_breaker.failure_threshold", service.circuit_breaker.failure_threshold.map(u64::from)),
        ("circuit_breaker.success_threshold", service.circuit_breaker.success_threshold.map(u64::from)),
        ("circuit_breaker.timeout_ms", service.circuit_breaker.timeout_ms),
    ];
    for (field, value) in overrides {
        if value == Some(0) {
            errors.push(ValidationError::NonPositive {
                field: format!("services.{}.{}", service.name, field),
            });
        }
    }
}

// The forwarding client speaks plain HTTP only.
fn check_url(service: &str, raw: &str, errors: &mut Vec<ValidationError>) {
    let reason = match Url::parse(raw) {
        Ok(url) if url.scheme() != "http" => Some(format!("unsupported scheme '{}'", url.scheme())),
        Ok(url) if url.host_str().is_none() => Some("missing host".to_string()),
        Ok(_) => None,
        Err(e) => Some(e.to_string()),
    };
    if let Some(reason) = reason {
        errors.push(ValidationError::InvalidUrl {
            service: service.to_string(),
            url: raw.to_string(),
            reason,
        });
    }
}
