//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, limits >= 0)
//! - Check the tenant URL and bind address are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ExporterConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ExporterConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
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

/// Validate a fully loaded configuration.
pub fn validate_config(config: &ExporterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.tenant.url.trim().is_empty() {
        errors.push(ValidationError::new("tenant.url", "is required (F5XC_TENANT_URL)"));
    } else {
        match url::Url::parse(config.tenant.url_str()) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {}
            Ok(u) => errors.push(ValidationError::new(
                "tenant.url",
                format!("must be an http(s) URL with a host, got scheme '{}'", u.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("tenant.url", format!("invalid URL: {}", e))),
        }
    }

    if config.tenant.access_token.trim().is_empty() {
        errors.push(ValidationError::new(
            "tenant.access_token",
            "is required (F5XC_ACCESS_TOKEN)",
        ));
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }

    if config.client.request_timeout_secs == 0 {
        errors.push(ValidationError::new("client.request_timeout_secs", "must be >= 1"));
    }

    if config.intervals.readiness_secs == 0 {
        errors.push(ValidationError::new("intervals.readiness_secs", "must be >= 1"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }

    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be >= 1"));
    }

    if config.circuit_breaker.success_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.success_threshold", "must be >= 1"));
    }

    let limits = [
        ("cardinality.max_namespaces", config.cardinality.max_namespaces),
        (
            "cardinality.max_load_balancers_per_namespace",
            config.cardinality.max_load_balancers_per_namespace,
        ),
        ("cardinality.max_dns_zones", config.cardinality.max_dns_zones),
        (
            "cardinality.warn_cardinality_threshold",
            config.cardinality.warn_cardinality_threshold,
        ),
    ];
    for (field, value) in limits {
        if value < 0 {
            errors.push(ValidationError::new(
                field,
                format!("must be >= 0 (0 = unlimited), got {}", value),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
