//! Cardinality limits and the dimensions they apply to.

use serde::Serialize;
use thiserror::Error;

use crate::config::CardinalityConfig;

/// Rejected limit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("{name} must be >= 0 (0 = unlimited), got {value}")]
    Negative { name: &'static str, value: i64 },
}

/// Dimension a limit applies to. The string form is the `limit_type` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitType {
    Namespace,
    LoadBalancer,
    DnsZone,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::Namespace => "namespace",
            LimitType::LoadBalancer => "load_balancer",
            LimitType::DnsZone => "dns_zone",
        }
    }
}

/// Validated limits. Zero means unlimited (or, for the warning threshold, disabled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardinalityLimits {
    pub max_namespaces: usize,
    pub max_load_balancers_per_namespace: usize,
    pub max_dns_zones: usize,
    pub warn_cardinality_threshold: u64,
}

impl CardinalityLimits {
    pub fn new(
        max_namespaces: i64,
        max_load_balancers_per_namespace: i64,
        max_dns_zones: i64,
        warn_cardinality_threshold: i64,
    ) -> Result<Self, LimitError> {
        Ok(Self {
            max_namespaces: non_negative("max_namespaces", max_namespaces)? as usize,
            max_load_balancers_per_namespace: non_negative(
                "max_load_balancers_per_namespace",
                max_load_balancers_per_namespace,
            )? as usize,
            max_dns_zones: non_negative("max_dns_zones", max_dns_zones)? as usize,
            warn_cardinality_threshold: non_negative(
                "warn_cardinality_threshold",
                warn_cardinality_threshold,
            )?,
        })
    }

    pub fn from_config(config: &CardinalityConfig) -> Result<Self, LimitError> {
        Self::new(
            config.max_namespaces,
            config.max_load_balancers_per_namespace,
            config.max_dns_zones,
            config.warn_cardinality_threshold,
        )
    }

    /// No limits and no warning.
    pub fn unlimited() -> Self {
        Self {
            max_namespaces: 0,
            max_load_balancers_per_namespace: 0,
            max_dns_zones: 0,
            warn_cardinality_threshold: 0,
        }
    }
}

impl Default for CardinalityLimits {
    fn default() -> Self {
        Self {
            max_namespaces: 100,
            max_load_balancers_per_namespace: 50,
            max_dns_zones: 100,
            warn_cardinality_threshold: 10_000,
        }
    }
}

fn non_negative(name: &'static str, value: i64) -> Result<u64, LimitError> {
    u64::try_from(value).map_err(|_| LimitError::Negative { name, value })
}

/// True when `current` distinct members already fill `limit` (0 = unlimited).
pub(crate) fn at_capacity(current: usize, limit: usize) -> bool {
    limit > 0 && current >= limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_limits_rejected() {
        let err = CardinalityLimits::new(-1, 0, 0, 0).unwrap_err();
        assert_eq!(
            err,
            LimitError::Negative {
                name: "max_namespaces",
                value: -1
            }
        );
        assert!(CardinalityLimits::new(1, 1, -7, 0).is_err());
        assert!(CardinalityLimits::new(1, 1, 1, -1).is_err());
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let limits = CardinalityLimits::from_config(&CardinalityConfig::default()).unwrap();
        assert_eq!(limits, CardinalityLimits::default());
    }

    #[test]
    fn test_zero_is_unlimited() {
        assert!(!at_capacity(1_000_000, 0));
        assert!(at_capacity(2, 2));
        assert!(!at_capacity(1, 2));
    }
}
