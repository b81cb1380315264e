//! Domain collectors.
//!
//! # Data Flow
//! ```text
//! scheduler tick
//!     → <domain>.collect()
//!     → ResilientClient typed call(s)
//!     → CardinalityTracker gate per namespace / load balancer / zone
//!     → gauges set in the shared MetricsRegistry
//!     → f5xc_<domain>_collection_success / _duration_seconds
//! ```
//!
//! # Design Decisions
//! - Upstream metric types map to gauge names through enums resolved by `match`
//! - Per-namespace failures are logged and skipped; only failures that leave the
//!   whole cycle without data are returned to the scheduler
//! - Response fields are read leniently: nulls, missing keys and numeric strings
//!   are all tolerated

pub mod dns;
pub mod loadbalancer;
pub mod quota;
pub mod security;
pub mod synthetic;

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::cardinality::CardinalityTracker;
use crate::client::{ApiError, ResilientClient};
use crate::config::IntervalConfig;
use crate::observability::MetricsRegistry;
use crate::scheduler::CollectionScheduler;

pub use dns::DnsCollector;
pub use loadbalancer::LoadBalancerCollector;
pub use quota::QuotaCollector;
pub use security::SecurityCollector;
pub use synthetic::SyntheticCollector;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{collector} collection failed: {message}")]
    Failed {
        collector: &'static str,
        message: String,
    },
}

pub type CollectorResult<T> = Result<T, CollectorError>;

/// Everything a collector needs, shared by all of them.
#[derive(Clone)]
pub struct CollectorContext {
    pub client: Arc<ResilientClient>,
    pub tracker: Arc<CardinalityTracker>,
    pub registry: MetricsRegistry,
    pub tenant: String,
}

impl CollectorContext {
    pub fn new(
        client: Arc<ResilientClient>,
        tracker: Arc<CardinalityTracker>,
        registry: MetricsRegistry,
    ) -> Self {
        let tenant = client.tenant_name().to_string();
        Self {
            client,
            tracker,
            registry,
            tenant,
        }
    }

    /// Set a gauge whose only label is `tenant`.
    pub(crate) fn set_tenant_gauge(&self, name: &'static str, value: f64) {
        self.registry
            .set_gauge(name, &[("tenant", self.tenant.as_str())], value);
    }

    /// Publish the outcome and duration of one collection cycle.
    pub(crate) fn finish_cycle<T>(
        &self,
        success_metric: &'static str,
        duration_metric: &'static str,
        started: Instant,
        result: &CollectorResult<T>,
    ) {
        let elapsed = started.elapsed().as_secs_f64();
        self.set_tenant_gauge(success_metric, if result.is_ok() { 1.0 } else { 0.0 });
        self.set_tenant_gauge(duration_metric, elapsed);
    }
}

impl std::fmt::Debug for CollectorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorContext")
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

/// Register every domain with the scheduler at its configured interval.
pub fn register_collectors(
    scheduler: &mut CollectionScheduler,
    ctx: &CollectorContext,
    intervals: &IntervalConfig,
) {
    let quota = Arc::new(QuotaCollector::new(ctx.clone()));
    scheduler.register("quota", intervals.quota_secs, move || {
        let c = quota.clone();
        async move { c.collect().await }
    });

    let security = Arc::new(SecurityCollector::new(ctx.clone()));
    scheduler.register("security", intervals.security_secs, move || {
        let c = security.clone();
        async move { c.collect().await }
    });

    let synthetic = Arc::new(SyntheticCollector::new(ctx.clone()));
    scheduler.register("synthetic", intervals.synthetic_secs, move || {
        let c = synthetic.clone();
        async move { c.collect().await }
    });

    let dns = Arc::new(DnsCollector::new(ctx.clone()));
    scheduler.register("dns", intervals.dns_secs, move || {
        let c = dns.clone();
        async move { c.collect().await }
    });

    let lb = Arc::new(LoadBalancerCollector::new(ctx.clone()));
    scheduler.register("loadbalancer", intervals.load_balancer_secs(), move || {
        let c = lb.clone();
        async move { c.collect().await }
    });
}

/// Numeric value that may arrive as a JSON number or a numeric string.
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `value` field of the last element of a time series array.
pub(crate) fn latest_value(series: Option<&Value>) -> Option<&Value> {
    series?.as_array()?.last()?.get("value")
}

/// String field, treating absence, null and empty as missing.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Array field, treating absence and null as empty.
pub(crate) fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::cardinality::CardinalityLimits;
    use crate::config::{ClientConfig, RetryConfig, TenantConfig};
    use crate::resilience::CircuitBreaker;
    use std::time::Duration;

    /// Context pointing at an unreachable tenant, for processing tests.
    pub fn context(limits: CardinalityLimits) -> CollectorContext {
        let registry = MetricsRegistry::new();
        let client = ResilientClient::new(
            &TenantConfig {
                url: "http://acme.localhost:9".to_string(),
                access_token: "token".to_string(),
            },
            &ClientConfig {
                request_timeout_secs: 2,
                max_concurrent_requests: 0,
            },
            &RetryConfig {
                max_attempts: 1,
                base_delay_ms: 1,
                max_delay_ms: 1,
            },
            Arc::new(CircuitBreaker::new(5, Duration::from_secs(60), 1)),
            &registry,
        )
        .unwrap();
        let tracker = CardinalityTracker::new(limits, &registry);
        CollectorContext::new(Arc::new(client), Arc::new(tracker), registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_f64_accepts_strings_and_numbers() {
        assert_eq!(as_f64(&json!("12.5")), Some(12.5));
        assert_eq!(as_f64(&json!(3)), Some(3.0));
        assert_eq!(as_f64(&json!("n/a")), None);
        assert_eq!(as_f64(&json!(null)), None);
    }

    #[test]
    fn test_latest_value_takes_last_point() {
        let series = json!([{"value": "1"}, {"value": "7"}]);
        assert_eq!(latest_value(Some(&series)), Some(&json!("7")));
        assert_eq!(latest_value(Some(&json!([]))), None);
        assert_eq!(latest_value(None), None);
    }

    #[test]
    fn test_field_helpers_tolerate_nulls() {
        let v = json!({"name": "", "items": null, "zone": "a.com"});
        assert_eq!(str_field(&v, "name"), None);
        assert_eq!(str_field(&v, "zone"), Some("a.com"));
        assert!(array_field(&v, "items").is_empty());
    }

    #[test]
    fn test_register_collectors_honours_disabled_domains() {
        use crate::cardinality::CardinalityLimits;
        use crate::lifecycle::Shutdown;

        let ctx = test_support::context(CardinalityLimits::default());
        let intervals = IntervalConfig {
            dns_secs: 0,
            http_lb_secs: 60,
            tcp_lb_secs: 300,
            udp_lb_secs: 0,
            ..IntervalConfig::default()
        };
        let mut scheduler = CollectionScheduler::new(Shutdown::new());
        register_collectors(&mut scheduler, &ctx, &intervals);

        assert_eq!(
            scheduler.domains(),
            vec!["quota", "security", "synthetic", "loadbalancer"]
        );
        let lb = scheduler
            .domain_info()
            .into_iter()
            .find(|d| d.name == "loadbalancer")
            .unwrap();
        assert_eq!(lb.interval_secs, 300.0);
    }
}
