//! F5 Distributed Cloud Prometheus exporter.
//!
//! Polls the tenant API on per-domain intervals and serves the results as
//! Prometheus gauges.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌────────────────────────────── f5xc-exporter ──────────────────────────────┐
//!   │                                                                           │
//!   │  scheduler ──▶ collectors ──▶ ResilientClient ──▶ F5 XC tenant API        │
//!   │  (1 task /      (quota, lb,      │ circuit breaker (per endpoint)         │
//!   │   domain)        dns, ...)       │ retries + backoff, Retry-After         │
//!   │                    │             │ concurrency limit                      │
//!   │                    ▼                                                      │
//!   │             CardinalityTracker ──▶ MetricsRegistry ◀── GET /metrics       │
//!   │                                         ▲                                 │
//!   │  readiness monitor ─────────────────────┼────────────── GET /ready        │
//!   │                                         └────────────── GET /health       │
//!   │                                                         GET /status       │
//!   └───────────────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use f5xc_exporter::cardinality::{CardinalityLimits, CardinalityTracker};
use f5xc_exporter::client::ResilientClient;
use f5xc_exporter::collectors::{register_collectors, CollectorContext};
use f5xc_exporter::config::load_config;
use f5xc_exporter::health::ReadinessMonitor;
use f5xc_exporter::http::{AppState, HttpServer};
use f5xc_exporter::lifecycle::{signals::wait_for_signal, Shutdown};
use f5xc_exporter::observability::{logging::init_logging, MetricsRegistry};
use f5xc_exporter::resilience::CircuitBreaker;
use f5xc_exporter::scheduler::CollectionScheduler;

#[derive(Parser)]
#[command(name = "f5xc-exporter", version)]
#[command(about = "Prometheus exporter for F5 Distributed Cloud", long_about = None)]
struct Args {
    /// Optional TOML config file; F5XC_* environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_logging(&config.observability);

    let tenant = config.tenant.tenant_name().unwrap_or_default();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        tenant = %tenant,
        "f5xc-exporter starting"
    );
    tracing::info!(
        bind_address = %config.server.bind_address,
        failure_threshold = config.circuit_breaker.failure_threshold,
        breaker_timeout_secs = config.circuit_breaker.timeout_secs,
        max_namespaces = config.cardinality.max_namespaces,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Core components, shared by every collector
    let registry = MetricsRegistry::new();
    let breaker = Arc::new(CircuitBreaker::from_config(&config.circuit_breaker));
    let limits = CardinalityLimits::from_config(&config.cardinality)?;
    let tracker = Arc::new(CardinalityTracker::new(limits, &registry));
    let client = Arc::new(ResilientClient::new(
        &config.tenant,
        &config.client,
        &config.retries,
        breaker.clone(),
        &registry,
    )?);

    let shutdown = Shutdown::new();
    let ctx = CollectorContext::new(client.clone(), tracker.clone(), registry.clone());
    let mut scheduler = CollectionScheduler::new(shutdown.clone());
    register_collectors(&mut scheduler, &ctx, &config.intervals);

    let readiness = Arc::new(ReadinessMonitor::new(
        client.clone(),
        Duration::from_secs(config.intervals.readiness_secs),
    ));
    let readiness_task = tokio::spawn(readiness.clone().run(shutdown.subscribe()));

    let state = AppState {
        registry,
        tracker,
        breaker,
        readiness,
        tenant: Arc::from(tenant.as_str()),
        intervals: Arc::new(config.intervals.clone()),
        domains: Arc::from(scheduler.domain_info()),
    };
    let server = HttpServer::new(state);
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(listener, server_shutdown).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    scheduler.start();

    let signal = wait_for_signal().await;
    tracing::info!(signal, "Shutdown signal received");

    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let report = scheduler.shutdown(timeout).await;
    if !report.aborted.is_empty() {
        tracing::warn!(aborted = ?report.aborted, "Some collectors were aborted");
    }

    for (name, task) in [("readiness", readiness_task), ("http", server_task)] {
        if tokio::time::timeout(timeout, task).await.is_err() {
            tracing::warn!(task = name, "Task did not stop within shutdown timeout");
        }
    }

    drop(ctx);
    drop(client);
    tracing::info!("Shutdown complete");
    Ok(())
}
