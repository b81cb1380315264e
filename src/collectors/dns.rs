//! DNS collector: zone query counts, DNS load balancer health and pool member health.

use serde_json::Value;
use std::time::Instant;

use crate::collectors::{
    array_field, as_f64, latest_value, str_field, CollectorContext, CollectorResult,
};

const COLLECTOR: &str = "dns";
const STEP_SECS: i64 = 300;

const ZONE_QUERY_COUNT: &str = "f5xc_dns_zone_query_count";
const LB_HEALTH: &str = "f5xc_dns_lb_health_status";
const POOL_MEMBER_HEALTH: &str = "f5xc_dns_lb_pool_member_health";
const ZONE_COUNT: &str = "f5xc_dns_zone_count";
const LB_COUNT: &str = "f5xc_dns_lb_count";
const COLLECTION_SUCCESS: &str = "f5xc_dns_collection_success";
const COLLECTION_DURATION: &str = "f5xc_dns_collection_duration_seconds";

fn health_value(status: Option<&str>) -> f64 {
    if status == Some("HEALTHY") {
        1.0
    } else {
        0.0
    }
}

pub struct DnsCollector {
    ctx: CollectorContext,
}

impl DnsCollector {
    pub fn new(ctx: CollectorContext) -> Self {
        let r = &ctx.registry;
        r.describe_gauge(ZONE_QUERY_COUNT, "Total DNS queries per zone");
        r.describe_gauge(
            LB_HEALTH,
            "DNS Load Balancer health status (1=healthy, 0=unhealthy)",
        );
        r.describe_gauge(
            POOL_MEMBER_HEALTH,
            "DNS LB pool member health status (1=healthy, 0=unhealthy)",
        );
        r.describe_gauge(ZONE_COUNT, "Number of DNS zones discovered");
        r.describe_gauge(LB_COUNT, "Number of DNS load balancers discovered");
        r.describe_gauge(
            COLLECTION_SUCCESS,
            "Whether DNS metrics collection succeeded (1=success, 0=failure)",
        );
        r.describe_gauge(COLLECTION_DURATION, "Time taken to collect DNS metrics");
        Self { ctx }
    }

    pub async fn collect(&self) -> CollectorResult<()> {
        let started = Instant::now();
        let result = self.collect_all().await;
        self.ctx
            .finish_cycle(COLLECTION_SUCCESS, COLLECTION_DURATION, started, &result);

        match &result {
            Ok((zones, lbs)) => tracing::info!(
                duration_secs = started.elapsed().as_secs_f64(),
                zone_count = zones,
                lb_count = lbs,
                "DNS metrics collection successful"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to collect DNS metrics"),
        }
        result.map(|_| ())
    }

    /// Each sub-call degrades to "nothing found" on error, so the cycle
    /// itself only reports success.
    async fn collect_all(&self) -> CollectorResult<(u64, u64)> {
        let client = &self.ctx.client;

        let zones = match client.get_dns_zone_metrics(&["DNS_ZONE_NAME"], STEP_SECS).await {
            Ok(data) => self.process_zones(&data),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get DNS zone metrics");
                0
            }
        };

        let lbs = match client.get_dns_lb_health_status().await {
            Ok(data) => self.process_lb_health(&data),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get DNS LB health status");
                0
            }
        };

        match client.get_dns_lb_pool_member_health().await {
            Ok(data) => self.process_pool_members(&data),
            Err(e) => tracing::warn!(error = %e, "Failed to get DNS LB pool member health"),
        }

        self.ctx.set_tenant_gauge(ZONE_COUNT, zones as f64);
        self.ctx.set_tenant_gauge(LB_COUNT, lbs as f64);

        let tracker = &self.ctx.tracker;
        tracker.update_metric_cardinality(COLLECTOR, "dns_zone_metrics", zones);
        tracker.update_metric_cardinality(COLLECTOR, "dns_lb_metrics", lbs);

        Ok((zones, lbs))
    }

    fn process_zones(&self, data: &Value) -> u64 {
        let mut count = 0;
        for item in array_field(data, "data") {
            let Some(zone) = item.get("labels").and_then(|l| str_field(l, "DNS_ZONE_NAME")) else {
                continue;
            };
            if !self.ctx.tracker.check_dns_zone_limit(zone, COLLECTOR) {
                continue;
            }

            let Some(raw) = latest_value(item.get("value")) else {
                continue;
            };
            let Some(value) = as_f64(raw) else {
                tracing::warn!(zone = %zone, value = %raw, "Failed to parse DNS zone metric value");
                continue;
            };

            self.ctx.registry.set_gauge(
                ZONE_QUERY_COUNT,
                &[("tenant", self.ctx.tenant.as_str()), ("zone", zone)],
                value,
            );
            count += 1;
        }
        count
    }

    fn process_lb_health(&self, data: &Value) -> u64 {
        let mut count = 0;
        for item in array_field(data, "items") {
            let Some(name) = str_field(item, "name") else {
                continue;
            };
            let status = str_field(item, "health_status");
            self.ctx.registry.set_gauge(
                LB_HEALTH,
                &[("tenant", self.ctx.tenant.as_str()), ("dns_lb", name)],
                health_value(status),
            );
            tracing::debug!(dns_lb = %name, health_status = ?status, "DNS LB health status");
            count += 1;
        }
        count
    }

    fn process_pool_members(&self, data: &Value) {
        for item in array_field(data, "items") {
            let (Some(dns_lb), Some(pool)) =
                (str_field(item, "dns_lb_name"), str_field(item, "pool_name"))
            else {
                continue;
            };
            let member = str_field(item, "member_address").unwrap_or("unknown");

            self.ctx.registry.set_gauge(
                POOL_MEMBER_HEALTH,
                &[
                    ("tenant", self.ctx.tenant.as_str()),
                    ("dns_lb", dns_lb),
                    ("pool", pool),
                    ("member", member),
                ],
                health_value(str_field(item, "health_status")),
            );
        }
    }
}
