//! Outbound API error taxonomy.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials rejected. Never retried and never counted by the breaker.
    #[error("authentication failed for {endpoint}: invalid F5XC access token")]
    Authentication { endpoint: String },

    #[error("rate limited on {endpoint}, retry after {}s", .retry_after.as_secs())]
    RateLimited {
        endpoint: String,
        retry_after: Duration,
    },

    /// Rejected locally; no request was sent.
    #[error("circuit breaker is open for endpoint: {endpoint}")]
    CircuitOpen { endpoint: String },

    #[error("API request to {endpoint} failed{}: {message}", status_suffix(.status))]
    Api {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("client setup failed: {0}")]
    Setup(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {}", s)).unwrap_or_default()
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => *status,
            ApiError::Authentication { .. } => Some(401),
            ApiError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Short label for logs and `/ready` payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Authentication { .. } => "authentication",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::CircuitOpen { .. } => "circuit_open",
            ApiError::Api { .. } => "api",
            ApiError::Setup(_) => "setup",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether this outcome counts against the endpoint's circuit breaker.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(
            self,
            ApiError::Authentication { .. } | ApiError::CircuitOpen { .. } | ApiError::Setup(_)
        )
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
