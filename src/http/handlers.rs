use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cardinality::CardinalityStats;
use crate::config::IntervalConfig;
use crate::http::server::AppState;
use crate::resilience::EndpointSnapshot;
use crate::scheduler::DomainInfo;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub collectors: BTreeMap<String, &'static str>,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub tenant: String,
    pub intervals: IntervalConfig,
    pub domains: Vec<DomainInfo>,
    pub cardinality: CardinalityStats,
    pub circuit_breakers: Vec<EndpointSnapshot>,
}

pub async fn get_metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.registry.render(),
    )
        .into_response()
}

pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let collectors = state
        .domains
        .iter()
        .map(|d| {
            let status = if d.enabled { "enabled" } else { "disabled" };
            (d.name.clone(), status)
        })
        .collect();

    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        collectors,
    })
}

pub async fn get_ready(State(state): State<AppState>) -> Response {
    let status = state.readiness.status();
    if status.ready {
        let body = ReadyResponse {
            status: "ready",
            namespace_count: Some(status.namespace_count),
            error: None,
            last_check: status.last_check,
        };
        (StatusCode::OK, Json(body)).into_response()
    } else {
        let body = ReadyResponse {
            status: "not_ready",
            namespace_count: None,
            error: Some(
                status
                    .error
                    .unwrap_or_else(|| "readiness check has not completed".to_string()),
            ),
            last_check: status.last_check,
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        tenant: state.tenant.to_string(),
        intervals: (*state.intervals).clone(),
        domains: state.domains.to_vec(),
        cardinality: state.tracker.get_stats(),
        circuit_breakers: state.breaker.snapshot(),
    })
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}
