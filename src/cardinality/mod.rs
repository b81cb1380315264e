//! Cardinality control subsystem.
//!
//! # Data Flow
//! ```text
//! collector parses an API response
//!     → tracker.check_*_limit(label value, collector)
//!     → accepted: series written to the registry
//!     → rejected: series skipped, limit-exceeded gauge bumped
//!     → collector reports its series count via update_metric_cardinality
//! ```

pub mod limits;
pub mod tracker;

pub use limits::{CardinalityLimits, LimitError, LimitType};
pub use tracker::{CardinalityStats, CardinalityTracker};
