//! Circuit breaker for upstream API endpoints.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: endpoint assumed down, calls fail fast
//! - Half-Open: probing whether the endpoint recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures reach failure_threshold
//! Open → Half-Open: first allowance check after the timeout elapsed
//! Half-Open → Closed: consecutive successes reach success_threshold
//! Half-Open → Open: any failure (failure count pinned at threshold)
//! ```
//!
//! # Design Decisions
//! - Per-endpoint circuit breaker (not global)
//! - The Open → Half-Open transition happens inside `is_call_allowed`, not on a timer
//! - Entries live in a sharded map; endpoints on different shards never contend

use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;

/// Breaker state. The discriminants are the values exported as gauges.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Per-endpoint bookkeeping.
#[derive(Debug, Clone)]
struct BreakerEntry {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }
}

/// Point-in-time view of one endpoint, for `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub endpoint: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

/// Circuit breaker tracking every endpoint independently.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    entries: DashMap<String, BreakerEntry>,
}

impl CircuitBreaker {
    /// Create a breaker. Thresholds below 1 are treated as 1.
    pub fn new(failure_threshold: u32, timeout: Duration, success_threshold: u32) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            timeout,
            entries: DashMap::new(),
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.failure_threshold, config.timeout(), config.success_threshold)
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a call to `endpoint` may proceed right now.
    ///
    /// An open circuit whose timeout has elapsed is moved to half-open by this
    /// call, which then returns `true`.
    pub fn is_call_allowed(&self, endpoint: &str) -> bool {
        let mut entry = self.entries.entry(endpoint.to_string()).or_default();

        match entry.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = entry
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);

                if elapsed >= self.timeout {
                    entry.state = BreakerState::HalfOpen;
                    entry.consecutive_successes = 0;
                    tracing::info!(
                        endpoint = %endpoint,
                        timeout_secs = self.timeout.as_secs_f64(),
                        "Circuit breaker entering HALF_OPEN state"
                    );
                    true
                } else {
                    tracing::debug!(
                        endpoint = %endpoint,
                        retry_in_secs = (self.timeout - elapsed).as_secs(),
                        "Circuit breaker rejecting call"
                    );
                    false
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, endpoint: &str) {
        let mut entry = self.entries.entry(endpoint.to_string()).or_default();

        match entry.state {
            BreakerState::Closed => {
                entry.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                entry.consecutive_successes += 1;
                if entry.consecutive_successes >= self.success_threshold {
                    let successes = entry.consecutive_successes;
                    *entry = BreakerEntry::default();
                    tracing::info!(
                        endpoint = %endpoint,
                        success_count = successes,
                        "Circuit breaker closed after successful recovery"
                    );
                }
            }
            // A call admitted before the circuit opened finished late; the
            // open window stands.
            BreakerState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self, endpoint: &str) {
        let mut entry = self.entries.entry(endpoint.to_string()).or_default();
        let now = Instant::now();

        match entry.state {
            BreakerState::Closed => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= self.failure_threshold {
                    entry.state = BreakerState::Open;
                    entry.opened_at = Some(now);
                    tracing::warn!(
                        endpoint = %endpoint,
                        failure_count = entry.consecutive_failures,
                        threshold = self.failure_threshold,
                        "Circuit breaker opened due to failures"
                    );
                }
            }
            BreakerState::HalfOpen => {
                entry.state = BreakerState::Open;
                entry.opened_at = Some(now);
                entry.consecutive_failures = self.failure_threshold;
                entry.consecutive_successes = 0;
                tracing::warn!(
                    endpoint = %endpoint,
                    "Circuit breaker reopened after failure in HALF_OPEN"
                );
            }
            BreakerState::Open => {
                entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
                entry.opened_at = Some(now);
            }
        }
    }

    /// Current state; endpoints never seen are Closed.
    pub fn state(&self, endpoint: &str) -> BreakerState {
        self.entries
            .get(endpoint)
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }

    /// Numeric state for gauges (0=closed, 1=open, 2=half_open).
    pub fn get_state_value(&self, endpoint: &str) -> u8 {
        self.state(endpoint) as u8
    }

    pub fn get_failure_count(&self, endpoint: &str) -> u32 {
        self.entries
            .get(endpoint)
            .map(|e| e.consecutive_failures)
            .unwrap_or(0)
    }

    pub fn get_all_endpoints(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    /// Snapshot every endpoint, sorted by key.
    pub fn snapshot(&self) -> Vec<EndpointSnapshot> {
        let mut all: Vec<EndpointSnapshot> = self
            .entries
            .iter()
            .map(|r| EndpointSnapshot {
                endpoint: r.key().clone(),
                state: r.state,
                consecutive_failures: r.consecutive_failures,
                consecutive_successes: r.consecutive_successes,
            })
            .collect();
        all.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        all
    }
}
