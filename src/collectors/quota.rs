//! Quota usage collector.

use serde_json::Value;
use std::time::Instant;

use crate::collectors::{as_f64, CollectorContext, CollectorResult};

const COLLECTOR: &str = "quota";
const QUOTA_NAMESPACE: &str = "system";

const QUOTA_LIMIT: &str = "f5xc_quota_limit";
const QUOTA_CURRENT: &str = "f5xc_quota_current";
const QUOTA_UTILIZATION: &str = "f5xc_quota_utilization_percentage";
const COLLECTION_SUCCESS: &str = "f5xc_quota_collection_success";
const COLLECTION_DURATION: &str = "f5xc_quota_collection_duration_seconds";

/// Sections of the quota usage document and the `resource_type` label each maps to.
const SECTIONS: [(&str, &str); 3] = [
    ("quota_usage", "quota"),
    ("resources", "resource"),
    ("objects", "object"),
];

pub struct QuotaCollector {
    ctx: CollectorContext,
}

impl QuotaCollector {
    pub fn new(ctx: CollectorContext) -> Self {
        let r = &ctx.registry;
        r.describe_gauge(QUOTA_LIMIT, "F5XC quota limit");
        r.describe_gauge(QUOTA_CURRENT, "F5XC quota current usage");
        r.describe_gauge(QUOTA_UTILIZATION, "F5XC quota utilization percentage");
        r.describe_gauge(COLLECTION_SUCCESS, "Whether quota collection succeeded");
        r.describe_gauge(COLLECTION_DURATION, "Time taken to collect quota metrics");
        Self { ctx }
    }

    pub async fn collect(&self) -> CollectorResult<()> {
        let started = Instant::now();
        let result = self.collect_namespace(QUOTA_NAMESPACE).await;
        self.ctx
            .finish_cycle(COLLECTION_SUCCESS, COLLECTION_DURATION, started, &result);

        match &result {
            Ok(Some(count)) => tracing::info!(
                namespace = QUOTA_NAMESPACE,
                duration_secs = started.elapsed().as_secs_f64(),
                quota_metric_count = count,
                "Quota metrics collection successful"
            ),
            Ok(None) => {}
            Err(e) => tracing::error!(
                namespace = QUOTA_NAMESPACE,
                error = %e,
                "Failed to collect quota metrics"
            ),
        }
        result.map(|_| ())
    }

    /// `Ok(None)` when the namespace is refused by the cardinality limit.
    async fn collect_namespace(&self, namespace: &str) -> CollectorResult<Option<u64>> {
        if !self.ctx.tracker.check_namespace_limit(namespace, COLLECTOR) {
            tracing::warn!(
                namespace = %namespace,
                "Skipping quota collection due to namespace limit"
            );
            return Ok(None);
        }

        let data = self.ctx.client.get_quota_usage(namespace).await?;
        let count = self.process(&data, namespace);
        self.ctx
            .tracker
            .update_metric_cardinality(COLLECTOR, "quota_metrics", count);
        Ok(Some(count))
    }

    /// Write gauges for every quota entry; returns how many entries were usable.
    fn process(&self, data: &Value, namespace: &str) -> u64 {
        let mut count = 0;
        for (section, resource_type) in SECTIONS {
            let Some(entries) = data.get(section).and_then(Value::as_object) else {
                continue;
            };
            for (resource_name, info) in entries {
                let limit = info
                    .get("limit")
                    .and_then(|l| l.get("maximum"))
                    .and_then(as_f64);
                let current = info
                    .get("usage")
                    .and_then(|u| u.get("current"))
                    .and_then(as_f64);

                let (Some(limit), Some(current)) = (limit, current) else {
                    continue;
                };

                let labels = [
                    ("tenant", self.ctx.tenant.as_str()),
                    ("namespace", namespace),
                    ("resource_type", resource_type),
                    ("resource_name", resource_name.as_str()),
                ];
                let r = &self.ctx.registry;
                r.set_gauge(QUOTA_LIMIT, &labels, limit);
                r.set_gauge(QUOTA_CURRENT, &labels, current);
                r.set_gauge(QUOTA_UTILIZATION, &labels, utilization(limit, current));
                count += 1;
            }
        }
        count
    }
}

/// Percentage used; 0 for unlimited (limit <= 0) or missing (current < 0) data.
fn utilization(limit: f64, current: f64) -> f64 {
    if limit > 0.0 && current >= 0.0 {
        current / limit * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardinality::CardinalityLimits;
    use crate::collectors::test_support::context;
    use serde_json::json;

    #[test]
    fn test_utilization_edges() {
        assert_eq!(utilization(10.0, 5.0), 50.0);
        assert_eq!(utilization(-1.0, 5.0), 0.0);
        assert_eq!(utilization(0.0, 5.0), 0.0);
        assert_eq!(utilization(10.0, -1.0), 0.0);
    }

    #[test]
    fn test_process_walks_all_sections() {
        let ctx = context(CardinalityLimits::unlimited());
        let collector = QuotaCollector::new(ctx.clone());

        let data = json!({
            "quota_usage": {
                "http_loadbalancer": {"limit": {"maximum": 10}, "usage": {"current": 4}},
                "broken": {"limit": null, "usage": {"current": 1}}
            },
            "resources": {
                "cpu": {"limit": {"maximum": "-1"}, "usage": {"current": "3"}}
            },
            "objects": {
                "origin_pool": {"limit": {"maximum": 100}, "usage": {"current": 25}}
            }
        });

        assert_eq!(collector.process(&data, "system"), 3);

        let out = ctx.registry.render();
        assert!(out.contains(
            "f5xc_quota_utilization_percentage{tenant=\"acme\",namespace=\"system\",resource_type=\"quota\",resource_name=\"http_loadbalancer\"} 40"
        ));
        assert!(out.contains("resource_type=\"object\",resource_name=\"origin_pool\"} 25"));
        assert!(!out.contains("resource_name=\"broken\""));
    }

    #[tokio::test]
    async fn test_namespace_gate_skips_without_request() {
        // Limit of 1 is already taken, so "system" is refused before any call.
        let ctx = context(CardinalityLimits::new(1, 0, 0, 0).unwrap());
        assert!(ctx.tracker.check_namespace_limit("other", "dns"));

        let collector = QuotaCollector::new(ctx.clone());
        collector.collect().await.unwrap();

        assert!(ctx.client.breaker().get_all_endpoints().is_empty());
        assert!(ctx
            .registry
            .render()
            .contains("f5xc_quota_collection_success{tenant=\"acme\"} 1"));
    }
}
