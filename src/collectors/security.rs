//! Security collector: app firewall counters per load balancer and
//! security event counts per namespace.

use serde_json::Value;
use std::time::Instant;

use crate::client::endpoints::SECURITY_EVENT_TYPES;
use crate::collectors::{
    array_field, as_f64, latest_value, str_field, CollectorContext, CollectorResult,
};

const COLLECTOR: &str = "security";
const STEP_SECS: i64 = 300;

const COLLECTION_SUCCESS: &str = "f5xc_security_collection_success";
const COLLECTION_DURATION: &str = "f5xc_security_collection_duration_seconds";

/// Per-load-balancer counters from the app firewall metrics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallMetric {
    TotalRequests,
    AttackedRequests,
    BotDetection,
}

impl FirewallMetric {
    const ALL: [FirewallMetric; 3] = [
        FirewallMetric::TotalRequests,
        FirewallMetric::AttackedRequests,
        FirewallMetric::BotDetection,
    ];

    pub fn from_api(name: &str) -> Option<Self> {
        match name {
            "TOTAL_REQUESTS" => Some(FirewallMetric::TotalRequests),
            "ATTACKED_REQUESTS" => Some(FirewallMetric::AttackedRequests),
            "BOT_DETECTION" => Some(FirewallMetric::BotDetection),
            _ => None,
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            FirewallMetric::TotalRequests => "f5xc_security_total_requests",
            FirewallMetric::AttackedRequests => "f5xc_security_attacked_requests",
            FirewallMetric::BotDetection => "f5xc_security_bot_detections",
        }
    }

    fn help(&self) -> &'static str {
        match self {
            FirewallMetric::TotalRequests => "Total requests processed by app firewall",
            FirewallMetric::AttackedRequests => "WAF blocked/attacked requests",
            FirewallMetric::BotDetection => "Total bot detections (all classifications)",
        }
    }
}

/// Namespace-level security event families. DDoS and DoS share one gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventKind {
    Waf,
    BotDefense,
    Api,
    ServicePolicy,
    MaliciousUser,
    Dos,
}

impl SecurityEventKind {
    const ALL: [SecurityEventKind; 6] = [
        SecurityEventKind::Waf,
        SecurityEventKind::BotDefense,
        SecurityEventKind::Api,
        SecurityEventKind::ServicePolicy,
        SecurityEventKind::MaliciousUser,
        SecurityEventKind::Dos,
    ];

    pub fn from_api(event_type: &str) -> Option<Self> {
        match event_type {
            "waf_sec_event" => Some(SecurityEventKind::Waf),
            "bot_defense_sec_event" => Some(SecurityEventKind::BotDefense),
            "api_sec_event" => Some(SecurityEventKind::Api),
            "svc_policy_sec_event" => Some(SecurityEventKind::ServicePolicy),
            "malicious_user_sec_event" => Some(SecurityEventKind::MaliciousUser),
            "ddos_sec_event" | "dos_sec_event" => Some(SecurityEventKind::Dos),
            _ => None,
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            SecurityEventKind::Waf => "f5xc_security_waf_events",
            SecurityEventKind::BotDefense => "f5xc_security_bot_defense_events",
            SecurityEventKind::Api => "f5xc_security_api_events",
            SecurityEventKind::ServicePolicy => "f5xc_security_service_policy_events",
            SecurityEventKind::MaliciousUser => "f5xc_security_malicious_user_events",
            SecurityEventKind::Dos => "f5xc_security_dos_events",
        }
    }
}

pub struct SecurityCollector {
    ctx: CollectorContext,
}

impl SecurityCollector {
    pub fn new(ctx: CollectorContext) -> Self {
        let r = &ctx.registry;
        for metric in FirewallMetric::ALL {
            r.describe_gauge(metric.metric_name(), metric.help());
        }
        for kind in SecurityEventKind::ALL {
            r.describe_gauge(kind.metric_name(), "Security event count (namespace total)");
        }
        r.describe_gauge(
            COLLECTION_SUCCESS,
            "Whether security metrics collection succeeded (1=success, 0=failure)",
        );
        r.describe_gauge(COLLECTION_DURATION, "Time taken to collect security metrics");
        Self { ctx }
    }

    pub async fn collect(&self) -> CollectorResult<()> {
        let started = Instant::now();
        let result = self.collect_all().await;
        self.ctx
            .finish_cycle(COLLECTION_SUCCESS, COLLECTION_DURATION, started, &result);

        match &result {
            Ok((total, processed)) => {
                tracing::info!(
                    duration_secs = started.elapsed().as_secs_f64(),
                    namespace_count = total,
                    namespaces_processed = processed,
                    "Security metrics collection successful"
                );
            }
            Err(e) => tracing::error!(error = %e, "Failed to collect security metrics"),
        }
        result.map(|_| ())
    }

    async fn collect_all(&self) -> CollectorResult<(usize, u64)> {
        let namespaces = self.ctx.client.list_namespaces().await?;
        tracing::debug!(count = namespaces.len(), "Found namespaces for security collection");

        let mut processed = 0;
        for namespace in &namespaces {
            if !self.ctx.tracker.check_namespace_limit(namespace, COLLECTOR) {
                continue;
            }

            match self
                .ctx
                .client
                .get_app_firewall_metrics(namespace, STEP_SECS)
                .await
            {
                Ok(data) => self.process_firewall(&data, namespace),
                Err(e) => tracing::warn!(
                    namespace = %namespace,
                    error = %e,
                    "Failed to get app firewall metrics"
                ),
            }

            match self
                .ctx
                .client
                .get_security_event_counts(namespace, &SECURITY_EVENT_TYPES, STEP_SECS)
                .await
            {
                Ok(data) => self.process_events(&data, namespace),
                Err(e) => tracing::warn!(
                    namespace = %namespace,
                    error = %e,
                    "Failed to get security event counts"
                ),
            }

            processed += 1;
        }

        self.ctx
            .tracker
            .update_metric_cardinality(COLLECTOR, "security_metrics", processed);
        Ok((namespaces.len(), processed))
    }

    fn process_firewall(&self, data: &Value, namespace: &str) {
        for group in array_field(data, "data") {
            let Some(metric) = group
                .get("type")
                .and_then(Value::as_str)
                .and_then(FirewallMetric::from_api)
            else {
                continue;
            };

            for item in array_field(group, "data") {
                let load_balancer = item
                    .get("key")
                    .and_then(|k| str_field(k, "VIRTUAL_HOST"))
                    .unwrap_or("unknown");

                let Some(raw) = latest_value(item.get("value")) else {
                    continue;
                };
                let Some(value) = as_f64(raw) else {
                    tracing::warn!(
                        metric_type = metric.metric_name(),
                        value = %raw,
                        "Failed to parse app firewall metric value"
                    );
                    continue;
                };

                self.ctx.registry.set_gauge(
                    metric.metric_name(),
                    &[
                        ("tenant", self.ctx.tenant.as_str()),
                        ("namespace", namespace),
                        ("load_balancer", load_balancer),
                    ],
                    value,
                );
            }
        }
    }

    fn process_events(&self, data: &Value, namespace: &str) {
        let buckets = data
            .get("aggs")
            .and_then(|a| a.get("by_event_type"))
            .and_then(|a| a.get("field_aggregation"))
            .map(|a| array_field(a, "buckets"))
            .unwrap_or(&[]);

        let mut dos_total = 0.0;
        for bucket in buckets {
            let Some(kind) = bucket
                .get("key")
                .and_then(Value::as_str)
                .and_then(SecurityEventKind::from_api)
            else {
                continue;
            };
            let Some(count) = bucket.get("count").and_then(as_f64) else {
                continue;
            };

            if kind == SecurityEventKind::Dos {
                dos_total += count;
            } else {
                self.set_namespace_gauge(kind, namespace, count);
            }
        }

        self.set_namespace_gauge(SecurityEventKind::Dos, namespace, dos_total);
    }

    fn set_namespace_gauge(&self, kind: SecurityEventKind, namespace: &str, value: f64) {
        self.ctx.registry.set_gauge(
            kind.metric_name(),
            &[("tenant", self.ctx.tenant.as_str()), ("namespace", namespace)],
            value,
        );
    }
}
