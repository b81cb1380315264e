//! Cardinality tracker shared by every collector.
//!
//! # Responsibilities
//! - Gate new namespace, load balancer and DNS zone label values against limits
//! - Keep per-metric and per-collector series counts plus the running total
//! - Publish tracking gauges into the shared registry
//!
//! # Design Decisions
//! - Membership is monotonic: a tracked value is never evicted and re-checks always pass
//! - Each dimension has its own lock; check-then-insert is atomic within it
//! - Load balancer sets are sharded by namespace, with the cross-namespace
//!   total kept in an atomic so no shard is iterated while another is held
//! - Both cardinality maps sit behind one lock so the total always equals the
//!   sum of collector totals

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cardinality::limits::{at_capacity, CardinalityLimits, LimitType};
use crate::observability::MetricsRegistry;

const LIMIT_EXCEEDED: &str = "f5xc_cardinality_limit_exceeded";
const METRIC_CARDINALITY: &str = "f5xc_metric_cardinality";
const TRACKED_NAMESPACES: &str = "f5xc_tracked_namespaces_total";
const TRACKED_LOAD_BALANCERS: &str = "f5xc_tracked_load_balancers_total";
const TRACKED_DNS_ZONES: &str = "f5xc_tracked_dns_zones_total";
const COLLECTOR_CARDINALITY: &str = "f5xc_collector_cardinality";
const TOTAL_CARDINALITY: &str = "f5xc_total_cardinality";

#[derive(Debug, Default)]
struct CardinalityCounters {
    /// collector → metric name → series count
    per_metric: HashMap<String, HashMap<String, u64>>,
    per_collector: HashMap<String, u64>,
}

impl CardinalityCounters {
    fn total(&self) -> u64 {
        self.per_collector.values().sum()
    }
}

/// Snapshot returned by [`CardinalityTracker::get_stats`].
#[derive(Debug, Clone, Serialize)]
pub struct CardinalityStats {
    pub namespaces_tracked: usize,
    pub load_balancers_tracked: usize,
    pub dns_zones_tracked: usize,
    pub total_cardinality: u64,
    pub cardinality_per_collector: BTreeMap<String, u64>,
    pub limits_exceeded: BTreeMap<String, u64>,
    pub limits: CardinalityLimits,
}

pub struct CardinalityTracker {
    limits: CardinalityLimits,
    registry: MetricsRegistry,
    namespaces: Mutex<HashSet<String>>,
    load_balancers: DashMap<String, HashSet<String>>,
    load_balancer_total: AtomicUsize,
    dns_zones: Mutex<HashSet<String>>,
    counters: Mutex<CardinalityCounters>,
    /// (collector, limit type) → refusals
    limits_exceeded: DashMap<(String, LimitType), u64>,
}

impl CardinalityTracker {
    pub fn new(limits: CardinalityLimits, registry: &MetricsRegistry) -> Self {
        describe(registry);

        tracing::info!(
            max_namespaces = limits.max_namespaces,
            max_load_balancers_per_namespace = limits.max_load_balancers_per_namespace,
            max_dns_zones = limits.max_dns_zones,
            warn_threshold = limits.warn_cardinality_threshold,
            "Cardinality tracker initialized"
        );

        Self {
            limits,
            registry: registry.clone(),
            namespaces: Mutex::new(HashSet::new()),
            load_balancers: DashMap::new(),
            load_balancer_total: AtomicUsize::new(0),
            dns_zones: Mutex::new(HashSet::new()),
            counters: Mutex::new(CardinalityCounters::default()),
            limits_exceeded: DashMap::new(),
        }
    }

    pub fn limits(&self) -> &CardinalityLimits {
        &self.limits
    }

    /// May `collector` emit series labelled with `namespace`?
    pub fn check_namespace_limit(&self, namespace: &str, collector: &str) -> bool {
        let mut tracked = self.namespaces.lock();
        if tracked.contains(namespace) {
            return true;
        }

        if at_capacity(tracked.len(), self.limits.max_namespaces) {
            let current = tracked.len();
            drop(tracked);
            self.record_limit_exceeded(collector, LimitType::Namespace);
            tracing::warn!(
                namespace = %namespace,
                collector = %collector,
                current,
                limit = self.limits.max_namespaces,
                "Namespace limit exceeded"
            );
            return false;
        }

        tracked.insert(namespace.to_string());
        self.registry
            .set_gauge(TRACKED_NAMESPACES, &[], tracked.len() as f64);
        true
    }

    /// May `collector` emit series for `load_balancer` within `namespace`?
    pub fn check_load_balancer_limit(
        &self,
        namespace: &str,
        load_balancer: &str,
        collector: &str,
    ) -> bool {
        let mut tracked = self
            .load_balancers
            .entry(namespace.to_string())
            .or_default();
        if tracked.contains(load_balancer) {
            return true;
        }

        if at_capacity(tracked.len(), self.limits.max_load_balancers_per_namespace) {
            let current = tracked.len();
            drop(tracked);
            self.record_limit_exceeded(collector, LimitType::LoadBalancer);
            tracing::warn!(
                namespace = %namespace,
                load_balancer = %load_balancer,
                collector = %collector,
                current,
                limit = self.limits.max_load_balancers_per_namespace,
                "Load balancer limit exceeded for namespace"
            );
            return false;
        }

        tracked.insert(load_balancer.to_string());
        let total = self.load_balancer_total.fetch_add(1, Ordering::SeqCst) + 1;
        self.registry
            .set_gauge(TRACKED_LOAD_BALANCERS, &[], total as f64);
        true
    }

    /// May `collector` emit series labelled with DNS `zone`?
    pub fn check_dns_zone_limit(&self, zone: &str, collector: &str) -> bool {
        let mut tracked = self.dns_zones.lock();
        if tracked.contains(zone) {
            return true;
        }

        if at_capacity(tracked.len(), self.limits.max_dns_zones) {
            let current = tracked.len();
            drop(tracked);
            self.record_limit_exceeded(collector, LimitType::DnsZone);
            tracing::warn!(
                zone = %zone,
                collector = %collector,
                current,
                limit = self.limits.max_dns_zones,
                "DNS zone limit exceeded"
            );
            return false;
        }

        tracked.insert(zone.to_string());
        self.registry
            .set_gauge(TRACKED_DNS_ZONES, &[], tracked.len() as f64);
        true
    }

    /// Record how many series `collector` currently emits for `metric_name`.
    pub fn update_metric_cardinality(&self, collector: &str, metric_name: &str, cardinality: u64) {
        {
            let mut counters = self.counters.lock();
            let metrics = counters
                .per_metric
                .entry(collector.to_string())
                .or_default();
            metrics.insert(metric_name.to_string(), cardinality);
            let collector_total: u64 = metrics.values().sum();
            counters
                .per_collector
                .insert(collector.to_string(), collector_total);
            let total = counters.total();

            self.registry.set_gauge(
                METRIC_CARDINALITY,
                &[("collector", collector), ("metric_name", metric_name)],
                cardinality as f64,
            );
            self.registry.set_gauge(
                COLLECTOR_CARDINALITY,
                &[("collector", collector)],
                collector_total as f64,
            );
            self.registry
                .set_gauge(TOTAL_CARDINALITY, &[], total as f64);
        }

        let threshold = self.limits.warn_cardinality_threshold;
        if threshold > 0 && cardinality > threshold {
            tracing::warn!(
                collector = %collector,
                metric = %metric_name,
                cardinality,
                threshold,
                "High cardinality detected"
            );
        }
    }

    pub fn get_collector_cardinality(&self, collector: &str) -> u64 {
        self.counters
            .lock()
            .per_collector
            .get(collector)
            .copied()
            .unwrap_or(0)
    }

    pub fn get_total_cardinality(&self) -> u64 {
        self.counters.lock().total()
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.lock().len()
    }

    /// Load balancers tracked across all namespaces.
    pub fn load_balancer_count(&self) -> usize {
        self.load_balancer_total.load(Ordering::SeqCst)
    }

    pub fn zone_count(&self) -> usize {
        self.dns_zones.lock().len()
    }

    /// Times `collector` was refused on `limit_type`.
    pub fn limits_exceeded(&self, collector: &str, limit_type: LimitType) -> u64 {
        self.limits_exceeded
            .get(&(collector.to_string(), limit_type))
            .map(|v| *v)
            .unwrap_or(0)
    }

    pub fn get_stats(&self) -> CardinalityStats {
        let (total_cardinality, cardinality_per_collector) = {
            let counters = self.counters.lock();
            (
                counters.total(),
                counters
                    .per_collector
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect(),
            )
        };

        CardinalityStats {
            namespaces_tracked: self.namespace_count(),
            load_balancers_tracked: self.load_balancer_count(),
            dns_zones_tracked: self.zone_count(),
            total_cardinality,
            cardinality_per_collector,
            limits_exceeded: self
                .limits_exceeded
                .iter()
                .map(|r| {
                    let (collector, limit_type) = r.key();
                    (exceeded_key(collector, *limit_type), *r.value())
                })
                .collect(),
            limits: self.limits,
        }
    }

    /// Forget every tracked value and counter, zeroing the gauges they fed.
    pub fn reset_tracking(&self) {
        self.namespaces.lock().clear();
        self.dns_zones.lock().clear();
        self.load_balancers.clear();
        self.load_balancer_total.store(0, Ordering::SeqCst);
        {
            let mut counters = self.counters.lock();
            for (collector, metrics) in &counters.per_metric {
                for metric_name in metrics.keys() {
                    self.registry.set_gauge(
                        METRIC_CARDINALITY,
                        &[("collector", collector.as_str()), ("metric_name", metric_name.as_str())],
                        0.0,
                    );
                }
            }
            for collector in counters.per_collector.keys() {
                self.registry
                    .set_gauge(COLLECTOR_CARDINALITY, &[("collector", collector.as_str())], 0.0);
            }
            counters.per_metric.clear();
            counters.per_collector.clear();
        }
        self.limits_exceeded.retain(|(collector, limit_type), _| {
            self.registry.set_gauge(
                LIMIT_EXCEEDED,
                &[("collector", collector.as_str()), ("limit_type", limit_type.as_str())],
                0.0,
            );
            false
        });

        self.registry.set_gauge(TRACKED_NAMESPACES, &[], 0.0);
        self.registry.set_gauge(TRACKED_LOAD_BALANCERS, &[], 0.0);
        self.registry.set_gauge(TRACKED_DNS_ZONES, &[], 0.0);
        self.registry.set_gauge(TOTAL_CARDINALITY, &[], 0.0);

        tracing::info!("Cardinality tracking reset");
    }

    fn record_limit_exceeded(&self, collector: &str, limit_type: LimitType) {
        let mut count = self
            .limits_exceeded
            .entry((collector.to_string(), limit_type))
            .or_insert(0);
        *count += 1;
        self.registry.set_gauge(
            LIMIT_EXCEEDED,
            &[("collector", collector), ("limit_type", limit_type.as_str())],
            *count as f64,
        );
    }
}

impl std::fmt::Debug for CardinalityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardinalityTracker")
            .field("limits", &self.limits)
            .field("namespaces", &self.namespace_count())
            .field("load_balancers", &self.load_balancer_count())
            .field("dns_zones", &self.zone_count())
            .finish()
    }
}

fn exceeded_key(collector: &str, limit_type: LimitType) -> String {
    format!("{}_{}", collector, limit_type.as_str())
}

fn describe(registry: &MetricsRegistry) {
    registry.describe_gauge(
        LIMIT_EXCEEDED,
        "Number of times a cardinality limit was exceeded",
    );
    registry.describe_gauge(METRIC_CARDINALITY, "Current cardinality per metric");
    registry.describe_gauge(TRACKED_NAMESPACES, "Total number of tracked namespaces");
    registry.describe_gauge(
        TRACKED_LOAD_BALANCERS,
        "Total number of tracked load balancers",
    );
    registry.describe_gauge(TRACKED_DNS_ZONES, "Total number of tracked DNS zones");
    registry.describe_gauge(COLLECTOR_CARDINALITY, "Total cardinality per collector");
    registry.describe_gauge(TOTAL_CARDINALITY, "Total cardinality across all collectors");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn tracker(ns: i64, lb: i64, zones: i64) -> CardinalityTracker {
        let limits = CardinalityLimits::new(ns, lb, zones, 0).unwrap();
        CardinalityTracker::new(limits, &MetricsRegistry::new())
    }

    #[test]
    fn test_namespace_limit_admits_max_then_rejects() {
        let t = tracker(2, 0, 0);

        assert!(t.check_namespace_limit("ns1", "quota"));
        assert!(t.check_namespace_limit("ns2", "quota"));
        assert!(!t.check_namespace_limit("ns3", "quota"));
        assert_eq!(t.limits_exceeded("quota", LimitType::Namespace), 1);

        // Already tracked values always pass and are not double counted.
        assert!(t.check_namespace_limit("ns1", "security"));
        assert!(t.check_namespace_limit("ns2", "quota"));
        assert_eq!(t.namespace_count(), 2);
    }

    #[test]
    fn test_zero_limit_is_unbounded() {
        let t = tracker(0, 0, 0);
        for i in 0..500 {
            assert!(t.check_namespace_limit(&format!("ns{i}"), "lb"));
            assert!(t.check_load_balancer_limit("ns", &format!("lb{i}"), "lb"));
            assert!(t.check_dns_zone_limit(&format!("z{i}.example.com"), "dns"));
        }
        assert_eq!(t.namespace_count(), 500);
        assert_eq!(t.load_balancer_count(), 500);
        assert_eq!(t.zone_count(), 500);
    }

    #[test]
    fn test_load_balancer_limit_is_per_namespace() {
        let t = tracker(0, 1, 0);

        assert!(t.check_load_balancer_limit("ns1", "lb-a", "loadbalancer"));
        assert!(!t.check_load_balancer_limit("ns1", "lb-b", "loadbalancer"));
        assert!(t.check_load_balancer_limit("ns2", "lb-b", "loadbalancer"));
        assert!(t.check_load_balancer_limit("ns1", "lb-a", "loadbalancer"));

        assert_eq!(t.load_balancer_count(), 2);
        assert_eq!(t.limits_exceeded("loadbalancer", LimitType::LoadBalancer), 1);
    }

    #[test]
    fn test_dns_zone_limit_two_of_three() {
        let t = tracker(0, 0, 2);

        let accepted: Vec<bool> = ["a.com", "b.com", "c.com"]
            .iter()
            .map(|z| t.check_dns_zone_limit(z, "dns"))
            .collect();

        assert_eq!(accepted, vec![true, true, false]);
        assert_eq!(t.zone_count(), 2);
        assert_eq!(t.get_stats().limits_exceeded.get("dns_dns_zone"), Some(&1));
    }

    #[test]
    fn test_total_is_sum_of_collectors() {
        let t = tracker(0, 0, 0);

        t.update_metric_cardinality("quota", "quota_metrics", 10);
        t.update_metric_cardinality("dns", "dns_zone_metrics", 4);
        t.update_metric_cardinality("dns", "dns_lb_metrics", 6);
        assert_eq!(t.get_collector_cardinality("dns"), 10);
        assert_eq!(t.get_total_cardinality(), 20);

        // Replacing a metric's value replaces, not adds.
        t.update_metric_cardinality("dns", "dns_zone_metrics", 1);
        assert_eq!(t.get_collector_cardinality("dns"), 7);
        assert_eq!(t.get_total_cardinality(), 17);
        assert_eq!(t.get_collector_cardinality("unknown"), 0);
    }

    #[test]
    fn test_warn_threshold_never_gates() {
        let limits = CardinalityLimits::new(0, 0, 0, 5).unwrap();
        let t = CardinalityTracker::new(limits, &MetricsRegistry::new());

        t.update_metric_cardinality("lb", "http_lb_metrics", 50);
        assert_eq!(t.get_total_cardinality(), 50);
    }

    #[test]
    fn test_gauges_published() {
        let registry = MetricsRegistry::new();
        let t = CardinalityTracker::new(CardinalityLimits::new(1, 0, 0, 0).unwrap(), &registry);

        t.check_namespace_limit("ns1", "quota");
        t.check_namespace_limit("ns2", "quota");
        t.update_metric_cardinality("quota", "quota_metrics", 3);

        let out = registry.render();
        assert!(out.contains("f5xc_tracked_namespaces_total 1"));
        assert!(out.contains(
            "f5xc_cardinality_limit_exceeded{collector=\"quota\",limit_type=\"namespace\"} 1"
        ));
        assert!(out.contains("f5xc_total_cardinality 3"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let t = tracker(1, 1, 1);
        t.check_namespace_limit("ns1", "c");
        t.check_namespace_limit("ns2", "c");
        t.check_load_balancer_limit("ns1", "lb", "c");
        t.check_dns_zone_limit("z", "c");
        t.update_metric_cardinality("c", "m", 9);

        t.reset_tracking();

        let stats = t.get_stats();
        assert_eq!(stats.namespaces_tracked, 0);
        assert_eq!(stats.load_balancers_tracked, 0);
        assert_eq!(stats.dns_zones_tracked, 0);
        assert_eq!(stats.total_cardinality, 0);
        assert!(stats.limits_exceeded.is_empty());
        assert!(t.check_namespace_limit("ns2", "c"));
    }

    #[test]
    fn test_reset_zeroes_published_gauges() {
        let registry = MetricsRegistry::new();
        let limits = CardinalityLimits::new(1, 1, 0, 0).unwrap();
        let t = CardinalityTracker::new(limits, &registry);
        t.check_namespace_limit("ns1", "quota");
        t.check_namespace_limit("ns2", "quota");
        t.check_load_balancer_limit("ns1", "lb-a", "loadbalancer");
        t.check_load_balancer_limit("ns1", "lb-b", "loadbalancer");
        t.update_metric_cardinality("quota", "quota_metrics", 9);

        let out = registry.render();
        assert!(out.contains("f5xc_tracked_load_balancers_total 1"));
        assert!(out.contains("f5xc_collector_cardinality{collector=\"quota\"} 9"));

        t.reset_tracking();

        let out = registry.render();
        assert!(out.contains(
            "f5xc_cardinality_limit_exceeded{collector=\"quota\",limit_type=\"namespace\"} 0"
        ));
        assert!(out.contains(
            "f5xc_cardinality_limit_exceeded{collector=\"loadbalancer\",limit_type=\"load_balancer\"} 0"
        ));
        assert!(out.contains(
            "f5xc_metric_cardinality{collector=\"quota\",metric_name=\"quota_metrics\"} 0"
        ));
        assert!(out.contains("f5xc_collector_cardinality{collector=\"quota\"} 0"));
        assert!(out.contains("f5xc_total_cardinality 0"));
        assert!(out.contains("f5xc_tracked_load_balancers_total 0"));

        assert!(t.check_load_balancer_limit("ns9", "lb-z", "loadbalancer"));
        assert!(registry
            .render()
            .contains("f5xc_tracked_load_balancers_total 1"));
    }

    #[test]
    fn test_concurrent_namespace_checks_accept_exactly_half() {
        const N: usize = 64;
        let t = Arc::new(tracker((N / 2) as i64, 0, 0));

        let handles: Vec<_> = (0..N)
            .map(|i| {
                let t = t.clone();
                thread::spawn(move || t.check_namespace_limit(&format!("ns-{i}"), "quota"))
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, N / 2);
        assert_eq!(t.namespace_count(), N / 2);
        assert_eq!(t.limits_exceeded("quota", LimitType::Namespace), (N / 2) as u64);
    }

    #[test]
    fn test_concurrent_lb_total_matches_sets() {
        let t = Arc::new(tracker(0, 10, 0));

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let t = t.clone();
                thread::spawn(move || {
                    for i in 0..20 {
                        t.check_load_balancer_limit(&format!("ns{n}"), &format!("lb{i}"), "lb");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(t.load_balancer_count(), 80);
    }

    #[test]
    fn test_lb_gauge_tracks_total() {
        let registry = MetricsRegistry::new();
        let t = CardinalityTracker::new(CardinalityLimits::unlimited(), &registry);
        for i in 0..3 {
            t.check_load_balancer_limit("ns", &format!("lb{i}"), "loadbalancer");
        }
        t.check_load_balancer_limit("ns", "lb0", "loadbalancer");

        assert_eq!(t.load_balancer_count(), 3);
        assert!(registry
            .render()
            .contains("f5xc_tracked_load_balancers_total 3"));
    }
}
