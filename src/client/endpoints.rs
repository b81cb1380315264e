//! Typed F5XC API calls built on [`ResilientClient::get`] / [`ResilientClient::post`].
//!
//! Request bodies are built by pure functions taking the current time so they
//! can be checked without a server.

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::client::api::ResilientClient;
use crate::client::error::ApiResult;

pub const NAMESPACES_ENDPOINT: &str = "/api/web/namespaces";
pub const DNS_ZONE_METRICS_ENDPOINT: &str = "/api/data/namespaces/system/dns_zones/metrics";
pub const DNS_LB_HEALTH_ENDPOINT: &str =
    "/api/data/namespaces/system/dns_load_balancers/health_status";
pub const DNS_POOL_MEMBER_HEALTH_ENDPOINT: &str =
    "/api/data/namespaces/system/dns_load_balancers/pool_members_health_status";

/// Security event types fetched in one aggregation query.
pub const SECURITY_EVENT_TYPES: [&str; 7] = [
    "waf_sec_event",
    "bot_defense_sec_event",
    "api_sec_event",
    "svc_policy_sec_event",
    "malicious_user_sec_event",
    "ddos_sec_event",
    "dos_sec_event",
];

const LB_GRAPH_METRICS: [&str; 20] = [
    "HTTP_REQUEST_RATE",
    "HTTP_ERROR_RATE",
    "HTTP_ERROR_RATE_4XX",
    "HTTP_ERROR_RATE_5XX",
    "HTTP_RESPONSE_LATENCY",
    "HTTP_RESPONSE_LATENCY_PERCENTILE_50",
    "HTTP_RESPONSE_LATENCY_PERCENTILE_90",
    "HTTP_RESPONSE_LATENCY_PERCENTILE_99",
    "HTTP_APP_LATENCY",
    "HTTP_SERVER_DATA_TRANSFER_TIME",
    "TCP_CONNECTION_RATE",
    "TCP_ERROR_RATE",
    "TCP_ERROR_RATE_CLIENT",
    "TCP_ERROR_RATE_UPSTREAM",
    "TCP_CONNECTION_DURATION",
    "REQUEST_THROUGHPUT",
    "RESPONSE_THROUGHPUT",
    "CLIENT_RTT",
    "SERVER_RTT",
    "REQUEST_TO_ORIGIN_RATE",
];

const LB_GRAPH_HEALTHSCORES: [&str; 5] = [
    "HEALTHSCORE_OVERALL",
    "HEALTHSCORE_CONNECTIVITY",
    "HEALTHSCORE_PERFORMANCE",
    "HEALTHSCORE_SECURITY",
    "HEALTHSCORE_RELIABILITY",
];

/// Synthetic monitor families exposed by the global summary API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorType {
    Http,
    Dns,
}

impl MonitorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorType::Http => "http",
            MonitorType::Dns => "dns",
        }
    }
}

/// Namespaces worth scraping: drops platform-internal `ves-io-*` and the
/// aggregating `system` namespace.
pub fn filter_namespaces(response: &Value) -> Vec<String> {
    response
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str))
                .filter(|name| !name.is_empty() && !name.starts_with("ves-io-") && *name != "system")
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn window(now: DateTime<Utc>, step_secs: i64) -> (String, String) {
    let end = now.timestamp();
    ((end - step_secs).to_string(), end.to_string())
}

pub fn app_firewall_payload(namespace: &str, step_secs: i64, now: DateTime<Utc>) -> Value {
    let (start, end) = window(now, step_secs);
    json!({
        "namespace": namespace,
        "field_selector": ["TOTAL_REQUESTS", "ATTACKED_REQUESTS", "BOT_DETECTION"],
        "group_by": ["VIRTUAL_HOST"],
        "filter": format!("NAMESPACE=\"{}\"", namespace),
        "start_time": start,
        "end_time": end,
        "step": format!("{}s", step_secs),
    })
}

pub fn security_events_payload(
    namespace: &str,
    event_types: &[&str],
    step_secs: i64,
    now: DateTime<Utc>,
) -> Value {
    let start = now - ChronoDuration::seconds(step_secs);
    json!({
        "namespace": namespace,
        "query": format!("{{sec_event_type=~\"{}\"}}", event_types.join("|")),
        "aggs": {
            "by_event_type": {
                "field_aggregation": { "field": "SEC_EVENT_TYPE", "topk": 100 }
            }
        },
        "start_time": start.to_rfc3339_opts(SecondsFormat::Millis, true),
        "end_time": now.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub fn lb_graph_payload(step_secs: i64, now: DateTime<Utc>) -> Value {
    let (start, end) = window(now, step_secs);
    json!({
        "field_selector": {
            "node": {
                "metric": { "downstream": LB_GRAPH_METRICS, "upstream": LB_GRAPH_METRICS },
                "healthscore": { "downstream": LB_GRAPH_HEALTHSCORES, "upstream": LB_GRAPH_HEALTHSCORES },
            }
        },
        "step": format!("{}s", step_secs),
        "start_time": start,
        "end_time": end,
        "group_by": ["VHOST", "SITE", "VIRTUAL_HOST_TYPE"],
    })
}

pub fn dns_zone_payload(group_by: &[&str], step_secs: i64, now: DateTime<Utc>) -> Value {
    let (start, end) = window(now, step_secs);
    json!({
        "namespace": "system",
        "group_by": group_by,
        "filter": "",
        "start_time": start,
        "end_time": end,
        "step": format!("{}s", step_secs),
    })
}

impl ResilientClient {
    /// User namespaces of the tenant.
    pub async fn list_namespaces(&self) -> ApiResult<Vec<String>> {
        let response = self.get(NAMESPACES_ENDPOINT, &[]).await?;
        Ok(filter_namespaces(&response))
    }

    pub async fn get_quota_usage(&self, namespace: &str) -> ApiResult<Value> {
        let endpoint = format!("/api/web/namespaces/{}/quota/usage", namespace);
        self.get(&endpoint, &[]).await
    }

    /// Per-virtual-host firewall counters over the last `step_secs`.
    pub async fn get_app_firewall_metrics(&self, namespace: &str, step_secs: i64) -> ApiResult<Value> {
        let endpoint = format!("/api/data/namespaces/{}/app_firewall/metrics", namespace);
        self.post(&endpoint, &app_firewall_payload(namespace, step_secs, Utc::now()))
            .await
    }

    /// Namespace-wide security event counts bucketed by event type.
    pub async fn get_security_event_counts(
        &self,
        namespace: &str,
        event_types: &[&str],
        step_secs: i64,
    ) -> ApiResult<Value> {
        let endpoint = format!(
            "/api/data/namespaces/{}/app_security/events/aggregation",
            namespace
        );
        let body = security_events_payload(namespace, event_types, step_secs, Utc::now());
        self.post(&endpoint, &body).await
    }

    pub async fn get_synthetic_summary(
        &self,
        namespace: &str,
        monitor_type: MonitorType,
    ) -> ApiResult<Value> {
        let endpoint = format!(
            "/api/observability/synthetic_monitor/namespaces/{}/global-summary",
            namespace
        );
        self.get(&endpoint, &[("monitorType", monitor_type.as_str())])
            .await
    }

    /// Service graph for one namespace covering every load balancer type.
    pub async fn get_lb_metrics_for_namespace(
        &self,
        namespace: &str,
        step_secs: i64,
    ) -> ApiResult<Value> {
        let endpoint = format!("/api/data/namespaces/{}/graph/service", namespace);
        self.post(&endpoint, &lb_graph_payload(step_secs, Utc::now()))
            .await
    }

    /// Service graph nodes of every namespace merged into one document.
    ///
    /// The per-namespace API omits the namespace from node ids, so it is
    /// written into `id.namespace`. A namespace whose call fails is skipped;
    /// only a failure to list namespaces is returned.
    pub async fn get_all_lb_metrics(&self, step_secs: i64) -> ApiResult<Value> {
        let namespaces = self.list_namespaces().await?;
        tracing::info!(
            namespace_count = namespaces.len(),
            "Collecting LB metrics from all namespaces"
        );

        let mut nodes = Vec::new();
        for namespace in &namespaces {
            let response = match self.get_lb_metrics_for_namespace(namespace, step_secs).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        namespace = %namespace,
                        error = %e,
                        "Failed to get LB metrics for namespace"
                    );
                    continue;
                }
            };

            let found = take_nodes(response);
            tracing::debug!(namespace = %namespace, node_count = found.len(), "Collected LB metrics for namespace");
            for mut node in found {
                if let Some(id) = node.get_mut("id").and_then(Value::as_object_mut) {
                    id.insert("namespace".to_string(), Value::String(namespace.clone()));
                }
                nodes.push(node);
            }
        }

        tracing::info!(total_nodes = nodes.len(), "LB metrics collection complete");
        Ok(json!({ "data": { "nodes": nodes, "edges": [] } }))
    }

    pub async fn get_dns_zone_metrics(&self, group_by: &[&str], step_secs: i64) -> ApiResult<Value> {
        self.post(
            DNS_ZONE_METRICS_ENDPOINT,
            &dns_zone_payload(group_by, step_secs, Utc::now()),
        )
        .await
    }

    pub async fn get_dns_lb_health_status(&self) -> ApiResult<Value> {
        self.get(DNS_LB_HEALTH_ENDPOINT, &[]).await
    }

    pub async fn get_dns_lb_pool_member_health(&self) -> ApiResult<Value> {
        self.get(DNS_POOL_MEMBER_HEALTH_ENDPOINT, &[]).await
    }
}

fn take_nodes(mut response: Value) -> Vec<Value> {
    match response
        .get_mut("data")
        .and_then(|d| d.get_mut("nodes"))
        .map(Value::take)
    {
        Some(Value::Array(nodes)) => nodes,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_filter_namespaces() {
        let response = json!({
            "items": [
                {"name": "prod"},
                {"name": "system"},
                {"name": "ves-io-shared"},
                {"name": ""},
                {"other": "x"},
                {"name": "staging"}
            ]
        });
        assert_eq!(filter_namespaces(&response), vec!["prod", "staging"]);
        assert!(filter_namespaces(&json!({})).is_empty());
    }

    #[test]
    fn test_app_firewall_payload_window() {
        let body = app_firewall_payload("prod", 300, now());
        let end = now().timestamp();
        assert_eq!(body["end_time"], end.to_string());
        assert_eq!(body["start_time"], (end - 300).to_string());
        assert_eq!(body["filter"], "NAMESPACE=\"prod\"");
        assert_eq!(body["step"], "300s");
    }

    #[test]
    fn test_security_events_payload_uses_iso_times() {
        let body = security_events_payload("prod", &["waf_sec_event", "dos_sec_event"], 300, now());
        assert_eq!(body["end_time"], "2025-01-02T03:04:05.000Z");
        assert_eq!(body["start_time"], "2025-01-02T02:59:05.000Z");
        assert_eq!(body["query"], "{sec_event_type=~\"waf_sec_event|dos_sec_event\"}");
    }

    #[test]
    fn test_lb_graph_payload_has_no_type_filter() {
        let body = lb_graph_payload(120, now());
        assert!(body.get("label_filter").is_none());
        assert_eq!(
            body["field_selector"]["node"]["healthscore"]["upstream"]
                .as_array()
                .map(Vec::len),
            Some(5)
        );
    }

    #[test]
    fn test_take_nodes_tolerates_null_data() {
        assert!(take_nodes(json!({"data": null})).is_empty());
        assert_eq!(take_nodes(json!({"data": {"nodes": [{"id": {}}]}})).len(), 1);
    }
}
