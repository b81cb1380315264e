//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the exporter's HTTP surface
//! - Wire up request tracing
//! - Serve on a bound listener until the shutdown signal

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::cardinality::CardinalityTracker;
use crate::config::IntervalConfig;
use crate::health::ReadinessMonitor;
use crate::http::handlers::{get_health, get_metrics, get_ready, get_status, not_found};
use crate::observability::MetricsRegistry;
use crate::resilience::CircuitBreaker;
use crate::scheduler::DomainInfo;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: MetricsRegistry,
    pub tracker: Arc<CardinalityTracker>,
    pub breaker: Arc<CircuitBreaker>,
    pub readiness: Arc<ReadinessMonitor>,
    pub tenant: Arc<str>,
    pub intervals: Arc<IntervalConfig>,
    pub domains: Arc<[DomainInfo]>,
}

/// HTTP server exposing `/metrics`, `/health`, `/ready` and `/status`.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/health", get(get_health))
        .route("/ready", get(get_ready))
        .route("/status", get(get_status))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardinality::CardinalityLimits;
    use crate::collectors::test_support::context;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state() -> AppState {
        let ctx = context(CardinalityLimits::default());
        let readiness = Arc::new(ReadinessMonitor::new(
            ctx.client.clone(),
            Duration::from_secs(30),
        ));
        AppState {
            registry: ctx.registry.clone(),
            tracker: ctx.tracker.clone(),
            breaker: ctx.client.breaker().clone(),
            readiness,
            tenant: Arc::from(ctx.tenant.as_str()),
            intervals: Arc::new(IntervalConfig::default()),
            domains: Arc::from(vec![
                DomainInfo {
                    name: "quota".into(),
                    interval_secs: 600.0,
                    enabled: true,
                },
                DomainInfo {
                    name: "dns".into(),
                    interval_secs: 0.0,
                    enabled: false,
                },
            ]),
        }
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_renders_registry() {
        let state = state();
        state.tracker.check_namespace_limit("prod", "quota");
        let (status, body) = get(build_router(state), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("f5xc_tracked_namespaces_total 1"));
    }

    #[tokio::test]
    async fn test_health_lists_collectors() {
        let (status, body) = get(build_router(state()), "/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["collectors"]["quota"], "enabled");
        assert_eq!(json["collectors"]["dns"], "disabled");
    }

    #[tokio::test]
    async fn test_ready_follows_cached_status() {
        let state = state();
        let (status, body) = get(build_router(state.clone()), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("not_ready"));

        state.readiness.record(Ok(vec!["a".into(), "b".into(), "c".into()]));
        let (status, body) = get(build_router(state), "/ready").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["namespace_count"], 3);
    }

    #[tokio::test]
    async fn test_status_includes_breakers_and_cardinality() {
        let state = state();
        state.breaker.record_failure("/api/web/namespaces");
        state.tracker.update_metric_cardinality("quota", "quota_metrics", 7);

        let (status, body) = get(build_router(state), "/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["tenant"], "acme");
        assert_eq!(json["intervals"]["quota_secs"], 600);
        assert_eq!(json["cardinality"]["total_cardinality"], 7);
        assert_eq!(json["circuit_breakers"][0]["endpoint"], "/api/web/namespaces");
        assert_eq!(json["circuit_breakers"][0]["state"], "CLOSED");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (status, body) = get(build_router(state()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Not found");
    }
}
