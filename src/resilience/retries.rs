//! Retry classification for outbound API calls.
//!
//! # Responsibilities
//! - Decide whether a response status is worth another attempt
//! - Parse `Retry-After` hints on rate-limited responses
//!
//! # Design Decisions
//! - 429 and the gateway-style 5xx codes are retried; other 4xx are final
//! - 401 is never retried: bad credentials do not heal between attempts
//! - Connection and timeout errors are always retryable

use std::time::Duration;

/// Retry-after used when a 429 carries no usable hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Whether a response with `status` should be retried at the transport layer.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Parse a `Retry-After` header value given in seconds.
///
/// HTTP-date values are not used by the platform and yield `None`, as do
/// negative values and values too large for a `Duration`.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    let secs: f64 = value?.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
