//! Readiness checking.
//!
//! # Responsibilities
//! - Periodically confirm the tenant API answers a namespace listing
//! - Cache the latest outcome for the `/ready` handler

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::client::{ApiResult, ResilientClient};

/// Last readiness outcome. `last_check` is `None` until the first check finishes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub namespace_count: usize,
    pub error: Option<String>,
    pub last_check: Option<DateTime<Utc>>,
}

pub struct ReadinessMonitor {
    client: Arc<ResilientClient>,
    interval: Duration,
    status: RwLock<ReadinessStatus>,
}

impl ReadinessMonitor {
    pub fn new(client: Arc<ResilientClient>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            status: RwLock::new(ReadinessStatus::default()),
        }
    }

    pub fn status(&self) -> ReadinessStatus {
        self.status.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.status.read().ready
    }

    /// Check once and cache the result.
    pub async fn check(&self) -> ReadinessStatus {
        let result = self.client.list_namespaces().await;
        self.record(result)
    }

    pub(crate) fn record(&self, result: ApiResult<Vec<String>>) -> ReadinessStatus {
        match result {
            Ok(namespaces) => self.store(ReadinessStatus {
                ready: true,
                namespace_count: namespaces.len(),
                error: None,
                last_check: Some(Utc::now()),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Readiness check failed");
                self.record_failure(e.to_string())
            }
        }
    }

    fn record_failure(&self, error: String) -> ReadinessStatus {
        self.store(ReadinessStatus {
            ready: false,
            namespace_count: 0,
            error: Some(error),
            last_check: Some(Utc::now()),
        })
    }

    fn store(&self, status: ReadinessStatus) -> ReadinessStatus {
        let was_ready = std::mem::replace(&mut *self.status.write(), status.clone()).ready;
        if status.ready && !was_ready {
            tracing::info!(namespace_count = status.namespace_count, "Exporter is ready");
        }
        status
    }

    /// Check immediately, then every interval, until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Readiness monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if AssertUnwindSafe(self.check()).catch_unwind().await.is_err() {
                        tracing::error!("Readiness check panicked");
                        self.record_failure("readiness check panicked".to_string());
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Readiness monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for ReadinessMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessMonitor")
            .field("interval", &self.interval)
            .field("status", &*self.status.read())
            .finish()
    }
}
