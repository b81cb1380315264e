//! Synthetic monitoring summary collector.

use serde_json::Value;
use std::time::Instant;

use crate::client::MonitorType;
use crate::collectors::{as_f64, CollectorContext, CollectorResult};

const COLLECTOR: &str = "synthetic";

const COLLECTION_SUCCESS: &str = "f5xc_synthetic_collection_success";
const COLLECTION_DURATION: &str = "f5xc_synthetic_collection_duration_seconds";

struct SummaryGauges {
    total: &'static str,
    healthy: &'static str,
    critical: &'static str,
}

fn gauges_for(monitor_type: MonitorType) -> SummaryGauges {
    match monitor_type {
        MonitorType::Http => SummaryGauges {
            total: "f5xc_synthetic_http_monitors_total",
            healthy: "f5xc_synthetic_http_monitors_healthy",
            critical: "f5xc_synthetic_http_monitors_critical",
        },
        MonitorType::Dns => SummaryGauges {
            total: "f5xc_synthetic_dns_monitors_total",
            healthy: "f5xc_synthetic_dns_monitors_healthy",
            critical: "f5xc_synthetic_dns_monitors_critical",
        },
    }
}

pub struct SyntheticCollector {
    ctx: CollectorContext,
}

impl SyntheticCollector {
    pub fn new(ctx: CollectorContext) -> Self {
        let r = &ctx.registry;
        for monitor_type in [MonitorType::Http, MonitorType::Dns] {
            let g = gauges_for(monitor_type);
            r.describe_gauge(g.total, "Total number of synthetic monitors");
            r.describe_gauge(g.healthy, "Number of healthy synthetic monitors");
            r.describe_gauge(g.critical, "Number of critical synthetic monitors");
        }
        r.describe_gauge(
            COLLECTION_SUCCESS,
            "Whether synthetic monitoring collection succeeded (1=success, 0=failure)",
        );
        r.describe_gauge(
            COLLECTION_DURATION,
            "Time taken to collect synthetic monitoring metrics",
        );
        Self { ctx }
    }

    pub async fn collect(&self) -> CollectorResult<()> {
        let started = Instant::now();
        let result = self.collect_all().await;
        self.ctx
            .finish_cycle(COLLECTION_SUCCESS, COLLECTION_DURATION, started, &result);

        match &result {
            Ok(count) => tracing::info!(
                duration_secs = started.elapsed().as_secs_f64(),
                namespace_count = count,
                "Synthetic monitoring metrics collection successful"
            ),
            Err(e) => tracing::error!(error = %e, "Synthetic monitoring metrics collection failed"),
        }
        result.map(|_| ())
    }

    /// Returns how many namespaces passed the cardinality gate.
    async fn collect_all(&self) -> CollectorResult<u64> {
        let namespaces = self.ctx.client.list_namespaces().await?;
        let mut processed = 0;
        for namespace in &namespaces {
            if !self.ctx.tracker.check_namespace_limit(namespace, COLLECTOR) {
                tracing::debug!(
                    namespace = %namespace,
                    "Skipping synthetic monitoring due to namespace limit"
                );
                continue;
            }
            for monitor_type in [MonitorType::Http, MonitorType::Dns] {
                self.collect_summary(namespace, monitor_type).await;
            }
            processed += 1;
        }

        self.ctx
            .tracker
            .update_metric_cardinality(COLLECTOR, "synthetic_metrics", processed);
        Ok(processed)
    }

    async fn collect_summary(&self, namespace: &str, monitor_type: MonitorType) {
        match self
            .ctx
            .client
            .get_synthetic_summary(namespace, monitor_type)
            .await
        {
            Ok(data) => self.process_summary(&data, namespace, monitor_type),
            Err(e) if e.is_not_found() => tracing::debug!(
                namespace = %namespace,
                monitor_type = monitor_type.as_str(),
                "No synthetic monitors in namespace"
            ),
            Err(e) => tracing::warn!(
                namespace = %namespace,
                monitor_type = monitor_type.as_str(),
                error = %e,
                "Failed to get synthetic monitor summary"
            ),
        }
    }

    fn process_summary(&self, data: &Value, namespace: &str, monitor_type: MonitorType) {
        let read = |key: &str| data.get(key).and_then(as_f64).unwrap_or(0.0);
        let g = gauges_for(monitor_type);
        let labels = [("namespace", namespace)];

        self.ctx
            .registry
            .set_gauge(g.total, &labels, read("number_of_monitors"));
        self.ctx
            .registry
            .set_gauge(g.healthy, &labels, read("healthy_monitor_count"));
        self.ctx
            .registry
            .set_gauge(g.critical, &labels, read("critical_monitor_count"));
    }
}
