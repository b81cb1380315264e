//! Readiness subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (readiness.rs)
//!     → ResilientClient::list_namespaces
//!     → Cached ReadinessStatus
//!     → GET /ready reads the cache, never the API
//! ```
//!
//! # Design Decisions
//! - Checks go through the resilient client, so an open breaker on the
//!   namespace endpoint shows up as "not ready" without a network call
//! - `/health` is liveness only and does not consult this module

pub mod readiness;

pub use readiness::{ReadinessMonitor, ReadinessStatus};
