//! HTTP surface of the exporter.
//!
//! # Data Flow
//! ```text
//! Scrape / readiness request
//!     → server.rs (Axum router, TraceLayer)
//!     → handlers.rs
//!         /metrics → MetricsRegistry::render
//!         /health  → liveness + enabled domains
//!         /ready   → cached ReadinessStatus (503 until ready)
//!         /status  → intervals, domains, cardinality stats, breaker snapshot
//!     → 404 "Not found" for anything else
//! ```

pub mod handlers;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
