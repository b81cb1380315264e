//! Metrics registry and Prometheus exposition.
//!
//! # Responsibilities
//! - Own the Prometheus recorder every collector and core component writes to
//! - Hand out gauge handles keyed by name + labels
//! - Render the text exposition format for `/metrics`
//!
//! # Design Decisions
//! - The recorder is built explicitly and passed by reference, never installed
//!   as the process-global `metrics` recorder. Each test gets a fresh registry.
//! - Everything the exporter publishes is a gauge: values are snapshots of
//!   upstream counters, not locally accumulated totals.

use std::sync::Arc;

use metrics::{Gauge, Key, KeyName, Label, Level, Metadata, Recorder, SharedString};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

/// Shared, cheaply cloneable handle to the exporter's metrics registry.
#[derive(Clone)]
pub struct MetricsRegistry {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Build a fresh, empty registry.
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self {
            recorder: Arc::new(recorder),
            handle,
        }
    }

    /// Attach `# HELP` text to a gauge family.
    pub fn describe_gauge(&self, name: &'static str, help: &'static str) {
        self.recorder
            .describe_gauge(KeyName::from(name), None, SharedString::from(help));
    }

    /// Get (or lazily create) the gauge for `name` with the given label pairs.
    pub fn gauge(&self, name: &'static str, labels: &[(&'static str, &str)]) -> Gauge {
        let labels: Vec<Label> = labels
            .iter()
            .map(|(k, v)| Label::new(*k, v.to_string()))
            .collect();
        let key = Key::from_parts(name, labels);
        let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));
        self.recorder.register_gauge(&key, &metadata)
    }

    /// Set a gauge value in one call.
    pub fn set_gauge(&self, name: &'static str, labels: &[(&'static str, &str)], value: f64) {
        self.gauge(name, labels).set(value);
    }

    /// Render the Prometheus text exposition.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Get the underlying Prometheus handle (for the `/metrics` handler).
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}
