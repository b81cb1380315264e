//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the exporter.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the exporter.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ExporterConfig {
    /// Tenant connection settings.
    pub tenant: TenantConfig,

    /// HTTP listener for `/metrics`, `/health`, `/ready`.
    pub server: ServerConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Per-domain collection intervals.
    pub intervals: IntervalConfig,

    /// Outbound API client settings.
    pub client: ClientConfig,

    /// Transport retry configuration.
    pub retries: RetryConfig,

    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Cardinality limits.
    pub cardinality: CardinalityConfig,
}

/// Tenant connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TenantConfig {
    /// Tenant console URL (e.g., "https://acme.console.ves.volterra.io").
    pub url: String,

    /// API token sent as `Authorization: APIToken <token>`.
    pub access_token: String,
}

impl TenantConfig {
    /// Tenant URL without a trailing slash.
    pub fn url_str(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Tenant name: first label of the URL host, lowercased.
    pub fn tenant_name(&self) -> Option<String> {
        let parsed = url::Url::parse(self.url_str()).ok()?;
        let host = parsed.host_str()?;
        host.split('.').next().map(|s| s.to_lowercase())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Upper bound on how long shutdown waits for collection workers.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            shutdown_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}' (expected json or pretty)", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

/// Collection intervals in seconds. 0 disables a domain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub quota_secs: u64,
    pub http_lb_secs: u64,
    pub tcp_lb_secs: u64,
    pub udp_lb_secs: u64,
    pub dns_secs: u64,
    pub security_secs: u64,
    pub synthetic_secs: u64,
    /// Readiness check refresh interval.
    pub readiness_secs: u64,
}

impl IntervalConfig {
    /// The unified load balancer domain runs at the slowest LB interval.
    pub fn load_balancer_secs(&self) -> u64 {
        self.http_lb_secs.max(self.tcp_lb_secs).max(self.udp_lb_secs)
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            quota_secs: 600,
            http_lb_secs: 120,
            tcp_lb_secs: 120,
            udp_lb_secs: 120,
            dns_secs: 120,
            security_secs: 120,
            synthetic_secs: 120,
            readiness_secs: 30,
        }
    }
}

/// Outbound API client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum in-flight requests (0 = unlimited).
    pub max_concurrent_requests: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_concurrent_requests: 5,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Seconds an open circuit waits before probing.
    pub timeout_secs: u64,

    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_secs: 60,
            success_threshold: 2,
        }
    }
}

/// Cardinality limits. Signed so that negative input is caught by validation
/// instead of silently wrapping; 0 means unlimited (or disabled for the
/// warning threshold).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CardinalityConfig {
    pub max_namespaces: i64,
    pub max_load_balancers_per_namespace: i64,
    pub max_dns_zones: i64,
    pub warn_cardinality_threshold: i64,
}

impl Default for CardinalityConfig {
    fn default() -> Self {
        Self {
            max_namespaces: 100,
            max_load_balancers_per_namespace: 50,
            max_dns_zones: 100,
            warn_cardinality_threshold: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_name_from_url() {
        let tenant = TenantConfig {
            url: "https://Acme-Corp.console.ves.volterra.io/".to_string(),
            access_token: "t".to_string(),
        };
        assert_eq!(tenant.url_str(), "https://Acme-Corp.console.ves.volterra.io");
        assert_eq!(tenant.tenant_name().as_deref(), Some("acme-corp"));
    }

    #[test]
    fn test_load_balancer_interval_is_max() {
        let intervals = IntervalConfig {
            http_lb_secs: 60,
            tcp_lb_secs: 0,
            udp_lb_secs: 180,
            ..IntervalConfig::default()
        };
        assert_eq!(intervals.load_balancer_secs(), 180);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ExporterConfig = toml::from_str(
            r#"
            [tenant]
            url = "https://acme.console.ves.volterra.io"
            access_token = "secret"

            [cardinality]
            max_dns_zones = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.cardinality.max_dns_zones, 0);
        assert_eq!(config.cardinality.max_namespaces, 100);
        assert_eq!(config.intervals.quota_secs, 600);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
