//! F5XC API client subsystem.
//!
//! # Data Flow
//! ```text
//! collector
//!     → endpoints.rs (typed call, request body)
//!     → api.rs (breaker guard, retries, outcome classification)
//!     → serde_json::Value or ApiError
//! ```
//!
//! # Design Decisions
//! - Responses stay as `serde_json::Value`; collectors pick the fields they need
//!   and tolerate nulls instead of failing on shape drift
//! - The breaker key is the concrete request path

pub mod api;
pub mod endpoints;
pub mod error;

pub use api::ResilientClient;
pub use endpoints::MonitorType;
pub use error::{ApiError, ApiResult};
