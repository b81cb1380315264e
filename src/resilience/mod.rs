//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound API call:
//!     → circuit_breaker.rs (is the endpoint allowed right now?)
//!     → On retryable failure: retries.rs (classify) + backoff.rs (sleep)
//!     → circuit_breaker.rs (record final outcome)
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline (set on the reqwest client)
//! - Breaker state is per endpoint, so one failing namespace does not starve others
//! - Authentication failures bypass the breaker entirely

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;

pub use circuit_breaker::{BreakerState, CircuitBreaker, EndpointSnapshot};
