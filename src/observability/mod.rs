//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Collectors, client, breaker, tracker:
//!     → metrics.rs (gauges in the shared MetricsRegistry)
//!     → logging.rs (structured tracing events)
//!
//! Consumers:
//!     → GET /metrics (Prometheus scrape)
//!     → stdout (JSON or pretty)
//! ```
//!
//! # Design Decisions
//! - One registry per process, constructed in main and passed down
//! - Structured logging (JSON) by default for machine parsing

pub mod logging;
pub mod metrics;

pub use self::metrics::MetricsRegistry;
