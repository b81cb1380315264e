//! Unified HTTP/TCP/UDP load balancer collector.
//!
//! One service graph call per namespace returns every load balancer type; each
//! node's `id.virtual_host_type` decides which gauge family its datapoints feed.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

use crate::collectors::{
    array_field, as_f64, str_field, CollectorContext, CollectorResult,
};

const COLLECTOR: &str = "loadbalancer";
const STEP_SECS: i64 = 120;

const COLLECTION_SUCCESS: &str = "f5xc_lb_collection_success";
const COLLECTION_DURATION: &str = "f5xc_lb_collection_duration_seconds";

const DIRECTIONS: [&str; 2] = ["downstream", "upstream"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LbType {
    Http,
    Tcp,
    Udp,
}

impl LbType {
    const ALL: [LbType; 3] = [LbType::Http, LbType::Tcp, LbType::Udp];

    pub fn from_api(virtual_host_type: &str) -> Option<Self> {
        match virtual_host_type {
            "HTTP_LOAD_BALANCER" => Some(LbType::Http),
            "TCP_LOAD_BALANCER" => Some(LbType::Tcp),
            "UDP_LOAD_BALANCER" => Some(LbType::Udp),
            _ => None,
        }
    }

    fn count_metric(&self) -> &'static str {
        match self {
            LbType::Http => "f5xc_http_lb_count",
            LbType::Tcp => "f5xc_tcp_lb_count",
            LbType::Udp => "f5xc_udp_lb_count",
        }
    }

    fn cardinality_name(&self) -> &'static str {
        match self {
            LbType::Http => "http_lb_metrics",
            LbType::Tcp => "tcp_lb_metrics",
            LbType::Udp => "udp_lb_metrics",
        }
    }
}

/// Service graph metric types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbMetric {
    HttpRequestRate,
    HttpErrorRate,
    HttpErrorRate4xx,
    HttpErrorRate5xx,
    HttpResponseLatency,
    HttpResponseLatencyP50,
    HttpResponseLatencyP90,
    HttpResponseLatencyP99,
    HttpAppLatency,
    HttpServerDataTransferTime,
    TcpConnectionRate,
    TcpErrorRate,
    TcpErrorRateClient,
    TcpErrorRateUpstream,
    TcpConnectionDuration,
    RequestThroughput,
    ResponseThroughput,
    ClientRtt,
    ServerRtt,
    RequestToOriginRate,
}

impl LbMetric {
    const ALL: [LbMetric; 20] = [
        LbMetric::HttpRequestRate,
        LbMetric::HttpErrorRate,
        LbMetric::HttpErrorRate4xx,
        LbMetric::HttpErrorRate5xx,
        LbMetric::HttpResponseLatency,
        LbMetric::HttpResponseLatencyP50,
        LbMetric::HttpResponseLatencyP90,
        LbMetric::HttpResponseLatencyP99,
        LbMetric::HttpAppLatency,
        LbMetric::HttpServerDataTransferTime,
        LbMetric::TcpConnectionRate,
        LbMetric::TcpErrorRate,
        LbMetric::TcpErrorRateClient,
        LbMetric::TcpErrorRateUpstream,
        LbMetric::TcpConnectionDuration,
        LbMetric::RequestThroughput,
        LbMetric::ResponseThroughput,
        LbMetric::ClientRtt,
        LbMetric::ServerRtt,
        LbMetric::RequestToOriginRate,
    ];

    pub fn from_api(name: &str) -> Option<Self> {
        use LbMetric::*;
        Some(match name {
            "HTTP_REQUEST_RATE" => HttpRequestRate,
            "HTTP_ERROR_RATE" => HttpErrorRate,
            "HTTP_ERROR_RATE_4XX" => HttpErrorRate4xx,
            "HTTP_ERROR_RATE_5XX" => HttpErrorRate5xx,
            "HTTP_RESPONSE_LATENCY" => HttpResponseLatency,
            "HTTP_RESPONSE_LATENCY_PERCENTILE_50" => HttpResponseLatencyP50,
            "HTTP_RESPONSE_LATENCY_PERCENTILE_90" => HttpResponseLatencyP90,
            "HTTP_RESPONSE_LATENCY_PERCENTILE_99" => HttpResponseLatencyP99,
            "HTTP_APP_LATENCY" => HttpAppLatency,
            "HTTP_SERVER_DATA_TRANSFER_TIME" => HttpServerDataTransferTime,
            "TCP_CONNECTION_RATE" => TcpConnectionRate,
            "TCP_ERROR_RATE" => TcpErrorRate,
            "TCP_ERROR_RATE_CLIENT" => TcpErrorRateClient,
            "TCP_ERROR_RATE_UPSTREAM" => TcpErrorRateUpstream,
            "TCP_CONNECTION_DURATION" => TcpConnectionDuration,
            "REQUEST_THROUGHPUT" => RequestThroughput,
            "RESPONSE_THROUGHPUT" => ResponseThroughput,
            "CLIENT_RTT" => ClientRtt,
            "SERVER_RTT" => ServerRtt,
            "REQUEST_TO_ORIGIN_RATE" => RequestToOriginRate,
            _ => return None,
        })
    }

    /// Gauge for this metric on a load balancer of type `lb`, if that type reports it.
    pub fn metric_name(&self, lb: LbType) -> Option<&'static str> {
        use LbMetric::*;
        use LbType::*;
        let name = match (lb, self) {
            (Http, HttpRequestRate) => "f5xc_http_lb_request_rate",
            (Http, HttpErrorRate) => "f5xc_http_lb_error_rate",
            (Http, HttpErrorRate4xx) => "f5xc_http_lb_error_rate_4xx",
            (Http, HttpErrorRate5xx) => "f5xc_http_lb_error_rate_5xx",
            (Http, HttpResponseLatency) => "f5xc_http_lb_latency_seconds",
            (Http, HttpResponseLatencyP50) => "f5xc_http_lb_latency_p50_seconds",
            (Http, HttpResponseLatencyP90) => "f5xc_http_lb_latency_p90_seconds",
            (Http, HttpResponseLatencyP99) => "f5xc_http_lb_latency_p99_seconds",
            (Http, HttpAppLatency) => "f5xc_http_lb_app_latency_seconds",
            (Http, HttpServerDataTransferTime) => "f5xc_http_lb_server_data_transfer_time_seconds",
            (Http, RequestToOriginRate) => "f5xc_http_lb_request_to_origin_rate",
            (Http, RequestThroughput) => "f5xc_http_lb_request_throughput_bps",
            (Http, ResponseThroughput) => "f5xc_http_lb_response_throughput_bps",
            (Http, ClientRtt) => "f5xc_http_lb_client_rtt_seconds",
            (Http, ServerRtt) => "f5xc_http_lb_server_rtt_seconds",

            (Tcp, TcpConnectionRate) => "f5xc_tcp_lb_connection_rate",
            (Tcp, TcpErrorRate) => "f5xc_tcp_lb_error_rate",
            (Tcp, TcpErrorRateClient) => "f5xc_tcp_lb_error_rate_client",
            (Tcp, TcpErrorRateUpstream) => "f5xc_tcp_lb_error_rate_upstream",
            (Tcp, TcpConnectionDuration) => "f5xc_tcp_lb_connection_duration_seconds",
            (Tcp, RequestThroughput) => "f5xc_tcp_lb_request_throughput_bps",
            (Tcp, ResponseThroughput) => "f5xc_tcp_lb_response_throughput_bps",
            (Tcp, ClientRtt) => "f5xc_tcp_lb_client_rtt_seconds",
            (Tcp, ServerRtt) => "f5xc_tcp_lb_server_rtt_seconds",

            (Udp, RequestThroughput) => "f5xc_udp_lb_request_throughput_bps",
            (Udp, ResponseThroughput) => "f5xc_udp_lb_response_throughput_bps",
            (Udp, ClientRtt) => "f5xc_udp_lb_client_rtt_seconds",
            (Udp, ServerRtt) => "f5xc_udp_lb_server_rtt_seconds",

            _ => return None,
        };
        Some(name)
    }
}

/// Service graph health score types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Healthscore {
    Overall,
    Connectivity,
    Performance,
    Security,
    Reliability,
}

impl Healthscore {
    const ALL: [Healthscore; 5] = [
        Healthscore::Overall,
        Healthscore::Connectivity,
        Healthscore::Performance,
        Healthscore::Security,
        Healthscore::Reliability,
    ];

    pub fn from_api(name: &str) -> Option<Self> {
        match name {
            "HEALTHSCORE_OVERALL" => Some(Healthscore::Overall),
            "HEALTHSCORE_CONNECTIVITY" => Some(Healthscore::Connectivity),
            "HEALTHSCORE_PERFORMANCE" => Some(Healthscore::Performance),
            "HEALTHSCORE_SECURITY" => Some(Healthscore::Security),
            "HEALTHSCORE_RELIABILITY" => Some(Healthscore::Reliability),
            _ => None,
        }
    }

    pub fn metric_name(&self, lb: LbType) -> &'static str {
        use Healthscore::*;
        use LbType::*;
        match (lb, self) {
            (Http, Overall) => "f5xc_http_lb_healthscore_overall",
            (Http, Connectivity) => "f5xc_http_lb_healthscore_connectivity",
            (Http, Performance) => "f5xc_http_lb_healthscore_performance",
            (Http, Security) => "f5xc_http_lb_healthscore_security",
            (Http, Reliability) => "f5xc_http_lb_healthscore_reliability",
            (Tcp, Overall) => "f5xc_tcp_lb_healthscore_overall",
            (Tcp, Connectivity) => "f5xc_tcp_lb_healthscore_connectivity",
            (Tcp, Performance) => "f5xc_tcp_lb_healthscore_performance",
            (Tcp, Security) => "f5xc_tcp_lb_healthscore_security",
            (Tcp, Reliability) => "f5xc_tcp_lb_healthscore_reliability",
            (Udp, Overall) => "f5xc_udp_lb_healthscore_overall",
            (Udp, Connectivity) => "f5xc_udp_lb_healthscore_connectivity",
            (Udp, Performance) => "f5xc_udp_lb_healthscore_performance",
            (Udp, Security) => "f5xc_udp_lb_healthscore_security",
            (Udp, Reliability) => "f5xc_udp_lb_healthscore_reliability",
        }
    }
}

/// Labels shared by every datapoint of one service graph node.
struct NodeLabels<'a> {
    namespace: &'a str,
    load_balancer: &'a str,
    site: &'a str,
}

pub struct LoadBalancerCollector {
    ctx: CollectorContext,
}

impl LoadBalancerCollector {
    pub fn new(ctx: CollectorContext) -> Self {
        let r = &ctx.registry;
        for lb in LbType::ALL {
            for metric in LbMetric::ALL {
                if let Some(name) = metric.metric_name(lb) {
                    r.describe_gauge(name, "Load balancer service graph metric");
                }
            }
            for score in Healthscore::ALL {
                r.describe_gauge(score.metric_name(lb), "Load balancer health score (0-100)");
            }
            r.describe_gauge(lb.count_metric(), "Number of load balancers discovered");
        }
        r.describe_gauge(
            COLLECTION_SUCCESS,
            "Whether LB metrics collection succeeded (1=success, 0=failure)",
        );
        r.describe_gauge(COLLECTION_DURATION, "Time taken to collect all LB metrics");
        Self { ctx }
    }

    pub async fn collect(&self) -> CollectorResult<()> {
        let started = Instant::now();
        let result = self.collect_all().await;
        self.ctx
            .finish_cycle(COLLECTION_SUCCESS, COLLECTION_DURATION, started, &result);

        match &result {
            Ok(counts) => tracing::info!(
                duration_secs = started.elapsed().as_secs_f64(),
                http_lb_count = counts.get(&LbType::Http).copied().unwrap_or(0),
                tcp_lb_count = counts.get(&LbType::Tcp).copied().unwrap_or(0),
                udp_lb_count = counts.get(&LbType::Udp).copied().unwrap_or(0),
                "LB metrics collection successful"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to collect LB metrics"),
        }
        result.map(|_| ())
    }

    async fn collect_all(&self) -> CollectorResult<HashMap<LbType, u64>> {
        let data = self.ctx.client.get_all_lb_metrics(STEP_SECS).await?;
        let counts = self.process(&data);

        for lb in LbType::ALL {
            let count = counts.get(&lb).copied().unwrap_or(0);
            self.ctx.set_tenant_gauge(lb.count_metric(), count as f64);
            self.ctx
                .tracker
                .update_metric_cardinality(COLLECTOR, lb.cardinality_name(), count);
        }
        Ok(counts)
    }

    /// Process every node; returns how many load balancers of each type were kept.
    fn process(&self, data: &Value) -> HashMap<LbType, u64> {
        let nodes = data
            .get("data")
            .map(|d| array_field(d, "nodes"))
            .unwrap_or(&[]);
        tracing::debug!(node_count = nodes.len(), "Processing LB nodes");

        let mut counts = HashMap::new();
        for node in nodes {
            if let Some(lb) = self.process_node(node) {
                *counts.entry(lb).or_insert(0) += 1;
            }
        }
        counts
    }

    fn process_node(&self, node: &Value) -> Option<LbType> {
        let id = node.get("id").filter(|v| !v.is_null())?;
        let lb = str_field(id, "virtual_host_type").and_then(LbType::from_api)?;
        let load_balancer = str_field(id, "vhost")?;
        let labels = NodeLabels {
            namespace: str_field(id, "namespace").unwrap_or("unknown"),
            load_balancer,
            site: str_field(id, "site").unwrap_or("unknown"),
        };

        let tracker = &self.ctx.tracker;
        if !tracker.check_namespace_limit(labels.namespace, COLLECTOR)
            || !tracker.check_load_balancer_limit(labels.namespace, load_balancer, COLLECTOR)
        {
            return None;
        }

        let data = node.get("data");
        let metric = data.and_then(|d| d.get("metric"));
        let healthscore = data.and_then(|d| d.get("healthscore"));

        for direction in DIRECTIONS {
            for point in metric.map(|m| array_field(m, direction)).unwrap_or(&[]) {
                let name = point
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(LbMetric::from_api)
                    .and_then(|m| m.metric_name(lb));
                self.set_datapoint(name, point, &labels, direction);
            }
            for point in healthscore.map(|h| array_field(h, direction)).unwrap_or(&[]) {
                let name = point
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(Healthscore::from_api)
                    .map(|h| h.metric_name(lb));
                self.set_datapoint(name, point, &labels, direction);
            }
        }

        Some(lb)
    }

    /// Set `name` to the latest `value.raw` sample of `point`.
    fn set_datapoint(
        &self,
        name: Option<&'static str>,
        point: &Value,
        labels: &NodeLabels<'_>,
        direction: &str,
    ) {
        let Some(name) = name else {
            return;
        };
        let Some(latest) = point
            .get("value")
            .map(|v| array_field(v, "raw"))
            .and_then(<[Value]>::last)
            .and_then(|p| p.get("value"))
            .filter(|v| !v.is_null())
        else {
            return;
        };
        let Some(value) = as_f64(latest) else {
            tracing::warn!(metric = name, value = %latest, "Failed to parse datapoint value");
            return;
        };

        self.ctx.registry.set_gauge(
            name,
            &[
                ("tenant", self.ctx.tenant.as_str()),
                ("namespace", labels.namespace),
                ("load_balancer", labels.load_balancer),
                ("site", labels.site),
                ("direction", direction),
            ],
            value,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardinality::{CardinalityLimits, LimitType};
    use crate::collectors::test_support::context;
    use serde_json::json;

    fn node(ns: &str, vhost: &str, kind: &str) -> Value {
        json!({
            "id": {"namespace": ns, "vhost": vhost, "site": "ce-1", "virtual_host_type": kind},
            "data": {
                "metric": {
                    "downstream": [
                        {"type": "HTTP_REQUEST_RATE", "value": {"raw": [{"value": "1"}, {"value": "12.5"}]}},
                        {"type": "CLIENT_RTT", "value": {"raw": [{"value": 0.02}]}}
                    ],
                    "upstream": null
                },
                "healthscore": {
                    "upstream": [{"type": "HEALTHSCORE_OVERALL", "value": {"raw": [{"value": "98"}]}}]
                }
            }
        })
    }

    #[test]
    fn test_metric_mapping_respects_lb_type() {
        assert_eq!(
            LbMetric::HttpRequestRate.metric_name(LbType::Http),
            Some("f5xc_http_lb_request_rate")
        );
        assert_eq!(LbMetric::HttpRequestRate.metric_name(LbType::Tcp), None);
        assert_eq!(LbMetric::RequestToOriginRate.metric_name(LbType::Udp), None);
        assert_eq!(
            LbMetric::ClientRtt.metric_name(LbType::Udp),
            Some("f5xc_udp_lb_client_rtt_seconds")
        );
        assert_eq!(
            Healthscore::Security.metric_name(LbType::Tcp),
            "f5xc_tcp_lb_healthscore_security"
        );
    }

    #[test]
    fn test_process_counts_by_type_and_sets_gauges() {
        let ctx = context(CardinalityLimits::unlimited());
        let collector = LoadBalancerCollector::new(ctx.clone());

        let data = json!({"data": {"nodes": [
            node("prod", "shop", "HTTP_LOAD_BALANCER"),
            node("prod", "db", "TCP_LOAD_BALANCER"),
            node("prod", "site-node", "SITE"),
            {"id": null},
            {"id": {"virtual_host_type": "UDP_LOAD_BALANCER"}}
        ]}});

        let counts = collector.process(&data);
        assert_eq!(counts.get(&LbType::Http), Some(&1));
        assert_eq!(counts.get(&LbType::Tcp), Some(&1));
        assert_eq!(counts.get(&LbType::Udp), None);

        let out = ctx.registry.render();
        assert!(out.contains(
            "f5xc_http_lb_request_rate{tenant=\"acme\",namespace=\"prod\",load_balancer=\"shop\",site=\"ce-1\",direction=\"downstream\"} 12.5"
        ));
        assert!(out.contains(
            "f5xc_tcp_lb_healthscore_overall{tenant=\"acme\",namespace=\"prod\",load_balancer=\"db\",site=\"ce-1\",direction=\"upstream\"} 98"
        ));
        // HTTP-only metric on a TCP node is dropped.
        assert!(!out.contains("f5xc_tcp_lb_request_rate"));
    }

    #[test]
    fn test_per_namespace_lb_limit_drops_extra_nodes() {
        let ctx = context(CardinalityLimits::new(0, 1, 0, 0).unwrap());
        let collector = LoadBalancerCollector::new(ctx.clone());

        let data = json!({"data": {"nodes": [
            node("prod", "a", "HTTP_LOAD_BALANCER"),
            node("prod", "b", "HTTP_LOAD_BALANCER"),
            node("dev", "c", "HTTP_LOAD_BALANCER")
        ]}});

        let counts = collector.process(&data);
        assert_eq!(counts.get(&LbType::Http), Some(&2));
        assert_eq!(ctx.tracker.limits_exceeded(COLLECTOR, LimitType::LoadBalancer), 1);
        assert!(!ctx.registry.render().contains("load_balancer=\"b\""));
    }
}
