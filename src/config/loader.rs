//! Configuration loading from disk and environment.

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::ExporterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ExporterConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ExporterConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay `F5XC_*` variables onto `config`. `lookup` abstracts the environment
/// so tests do not have to mutate process state.
pub fn apply_env_overrides<F>(config: &mut ExporterConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("F5XC_TENANT_URL") {
        config.tenant.url = v;
    }
    if let Some(v) = lookup("F5XC_ACCESS_TOKEN") {
        config.tenant.access_token = v;
    }
    if let Some(v) = lookup("F5XC_EXP_HTTP_PORT") {
        let port: u16 = parse_value("F5XC_EXP_HTTP_PORT", &v)?;
        config.server.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(v) = lookup("F5XC_EXP_LOG_LEVEL") {
        config.observability.log_level = v.to_lowercase();
    }

    override_parsed(&lookup, "F5XC_SHUTDOWN_TIMEOUT", &mut config.server.shutdown_timeout_secs)?;
    override_parsed(&lookup, "F5XC_EXP_LOG_FORMAT", &mut config.observability.log_format)?;

    let intervals = &mut config.intervals;
    override_parsed(&lookup, "F5XC_QUOTA_INTERVAL", &mut intervals.quota_secs)?;
    override_parsed(&lookup, "F5XC_HTTP_LB_INTERVAL", &mut intervals.http_lb_secs)?;
    override_parsed(&lookup, "F5XC_TCP_LB_INTERVAL", &mut intervals.tcp_lb_secs)?;
    override_parsed(&lookup, "F5XC_UDP_LB_INTERVAL", &mut intervals.udp_lb_secs)?;
    override_parsed(&lookup, "F5XC_DNS_INTERVAL", &mut intervals.dns_secs)?;
    override_parsed(&lookup, "F5XC_SECURITY_INTERVAL", &mut intervals.security_secs)?;
    override_parsed(&lookup, "F5XC_SYNTHETIC_INTERVAL", &mut intervals.synthetic_secs)?;
    override_parsed(&lookup, "F5XC_READINESS_INTERVAL", &mut intervals.readiness_secs)?;

    override_parsed(&lookup, "F5XC_REQUEST_TIMEOUT", &mut config.client.request_timeout_secs)?;
    override_parsed(
        &lookup,
        "F5XC_MAX_CONCURRENT_REQUESTS",
        &mut config.client.max_concurrent_requests,
    )?;

    override_parsed(&lookup, "F5XC_RETRY_MAX_ATTEMPTS", &mut config.retries.max_attempts)?;
    override_parsed(&lookup, "F5XC_RETRY_BASE_DELAY_MS", &mut config.retries.base_delay_ms)?;
    override_parsed(&lookup, "F5XC_RETRY_MAX_DELAY_MS", &mut config.retries.max_delay_ms)?;

    let breaker = &mut config.circuit_breaker;
    override_parsed(
        &lookup,
        "F5XC_CIRCUIT_BREAKER_FAILURE_THRESHOLD",
        &mut breaker.failure_threshold,
    )?;
    override_parsed(&lookup, "F5XC_CIRCUIT_BREAKER_TIMEOUT", &mut breaker.timeout_secs)?;
    override_parsed(
        &lookup,
        "F5XC_CIRCUIT_BREAKER_SUCCESS_THRESHOLD",
        &mut breaker.success_threshold,
    )?;

    let cardinality = &mut config.cardinality;
    override_parsed(&lookup, "F5XC_MAX_NAMESPACES", &mut cardinality.max_namespaces)?;
    override_parsed(
        &lookup,
        "F5XC_MAX_LOAD_BALANCERS_PER_NAMESPACE",
        &mut cardinality.max_load_balancers_per_namespace,
    )?;
    override_parsed(&lookup, "F5XC_MAX_DNS_ZONES", &mut cardinality.max_dns_zones)?;
    override_parsed(
        &lookup,
        "F5XC_WARN_CARDINALITY_THRESHOLD",
        &mut cardinality.warn_cardinality_threshold,
    )?;

    Ok(())
}

fn override_parsed<F, T>(lookup: &F, var: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    if let Some(raw) = lookup(var) {
        *target = parse_value(var, &raw)?;
    }
    Ok(())
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        message: format!("'{}': {}", raw, e),
    })
}
