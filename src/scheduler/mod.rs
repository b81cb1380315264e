//! Collection scheduler.
//!
//! # Responsibilities
//! - Run each metric domain on its own interval in its own task
//! - Keep one domain's errors and panics away from every other domain
//! - Stop all workers within a bounded time on shutdown
//!
//! # Data Flow
//! ```text
//! register(domain, interval, collect_fn)  (interval 0 → disabled, no task)
//!     → start(): one tokio task per enabled domain
//!         loop: collect_fn().await (panic caught, error logged)
//!               select { sleep(interval), shutdown.recv() }
//!     → shutdown(timeout): trigger, join until deadline, abort the rest
//! ```
//!
//! # Design Decisions
//! - A cycle is awaited to completion before the next wait starts, so cycles
//!   of one domain never overlap and slow cycles simply stretch the period
//! - Shutdown does not interrupt a running cycle; the deadline does

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::collectors::CollectorResult;
use crate::lifecycle::Shutdown;

type CollectFn = Arc<dyn Fn() -> BoxFuture<'static, CollectorResult<()>> + Send + Sync>;

struct Domain {
    name: String,
    interval: Duration,
    collect: Option<CollectFn>,
}

/// Registered domain as shown on `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct DomainInfo {
    pub name: String,
    pub interval_secs: f64,
    pub enabled: bool,
}

/// Outcome of [`CollectionScheduler::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub joined: Vec<String>,
    pub aborted: Vec<String>,
}

pub struct CollectionScheduler {
    domains: Vec<Domain>,
    handles: Vec<(String, JoinHandle<()>)>,
    shutdown: Shutdown,
}

impl CollectionScheduler {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            domains: Vec::new(),
            handles: Vec::new(),
            shutdown,
        }
    }

    /// Register a domain polled every `interval_secs`; 0 disables it.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, interval_secs: u64, collect: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CollectorResult<()>> + Send + 'static,
    {
        self.register_every(name, Duration::from_secs(interval_secs), collect);
    }

    /// Register with an arbitrary interval; `Duration::ZERO` disables the domain.
    pub fn register_every<F, Fut>(&mut self, name: impl Into<String>, interval: Duration, collect: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CollectorResult<()>> + Send + 'static,
    {
        let name = name.into();
        let collect: Option<CollectFn> = if interval.is_zero() {
            tracing::info!(domain = %name, "Collection disabled (interval=0)");
            None
        } else {
            let boxed: CollectFn = Arc::new(move || collect().boxed());
            Some(boxed)
        };

        self.domains.push(Domain {
            name,
            interval,
            collect,
        });
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.domains
            .iter()
            .any(|d| d.name == name && d.collect.is_some())
    }

    /// Names of enabled domains, in registration order.
    pub fn domains(&self) -> Vec<String> {
        self.domains
            .iter()
            .filter(|d| d.collect.is_some())
            .map(|d| d.name.clone())
            .collect()
    }

    /// Every registered domain, enabled or not.
    pub fn domain_info(&self) -> Vec<DomainInfo> {
        self.domains
            .iter()
            .map(|d| DomainInfo {
                name: d.name.clone(),
                interval_secs: d.interval.as_secs_f64(),
                enabled: d.collect.is_some(),
            })
            .collect()
    }

    /// Spawn one worker per enabled domain. Calling again spawns nothing new.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            return;
        }

        for domain in &self.domains {
            let Some(collect) = domain.collect.clone() else {
                continue;
            };
            let handle = tokio::spawn(run_domain(
                domain.name.clone(),
                domain.interval,
                collect,
                self.shutdown.clone(),
            ));
            self.handles.push((domain.name.clone(), handle));
        }

        tracing::info!(
            workers = self.handles.len(),
            domains = ?self.domains(),
            "Collection scheduler started"
        );
    }

    /// Stop every worker, waiting at most `timeout` in total.
    pub async fn shutdown(&mut self, timeout: Duration) -> ShutdownReport {
        self.shutdown.trigger();

        let deadline = tokio::time::Instant::now() + timeout;
        let mut report = ShutdownReport::default();

        for (name, mut handle) in std::mem::take(&mut self.handles) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => report.joined.push(name),
                Err(_) => {
                    handle.abort();
                    tracing::warn!(domain = %name, "Collection worker did not stop in time, aborted");
                    report.aborted.push(name);
                }
            }
        }

        tracing::info!(
            joined = report.joined.len(),
            aborted = report.aborted.len(),
            "Collection scheduler stopped"
        );
        report
    }
}

impl std::fmt::Debug for CollectionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionScheduler")
            .field("domains", &self.domains())
            .field("running", &self.handles.len())
            .finish()
    }
}

async fn run_domain(name: String, interval: Duration, collect: CollectFn, shutdown: Shutdown) {
    let mut shutdown_rx = shutdown.subscribe();
    tracing::info!(
        domain = %name,
        interval_secs = interval.as_secs_f64(),
        "Collection worker starting"
    );

    loop {
        if shutdown.is_triggered() {
            break;
        }

        let started = Instant::now();
        match AssertUnwindSafe(collect()).catch_unwind().await {
            Ok(Ok(())) => tracing::debug!(
                domain = %name,
                duration_secs = started.elapsed().as_secs_f64(),
                "Collection cycle complete"
            ),
            Ok(Err(e)) => tracing::error!(
                domain = %name,
                error = %e,
                "Collection cycle failed"
            ),
            Err(panic) => tracing::error!(
                domain = %name,
                panic = %panic_message(panic.as_ref()),
                "Collection cycle panicked"
            ),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.recv() => break,
        }
    }

    tracing::info!(domain = %name, "Collection worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::CollectorError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test]
    async fn test_zero_interval_disables_domain() {
        let mut scheduler = CollectionScheduler::new(Shutdown::new());
        let runs = counter();
        let r = runs.clone();
        scheduler.register("dns", 0, move || {
            r.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        scheduler.register("quota", 600, || async { Ok(()) });

        assert!(!scheduler.is_enabled("dns"));
        assert!(scheduler.is_enabled("quota"));
        assert_eq!(scheduler.domains(), vec!["quota".to_string()]);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let report = scheduler.shutdown(Duration::from_secs(1)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(report.joined, vec!["quota".to_string()]);
    }

    #[tokio::test]
    async fn test_errors_and_panics_do_not_stop_worker() {
        let mut scheduler = CollectionScheduler::new(Shutdown::new());
        let runs = counter();
        let r = runs.clone();
        scheduler.register_every("flaky", Duration::from_millis(20), move || {
            let n = r.fetch_add(1, Ordering::SeqCst);
            async move {
                match n % 3 {
                    0 => Err(CollectorError::Failed {
                        collector: "flaky",
                        message: "boom".to_string(),
                    }),
                    1 => panic!("collector bug"),
                    _ => Ok(()),
                }
            }
        });

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let report = scheduler.shutdown(Duration::from_secs(1)).await;

        assert!(runs.load(Ordering::SeqCst) >= 4);
        assert_eq!(report.joined, vec!["flaky".to_string()]);
        assert!(report.aborted.is_empty());
    }

    #[tokio::test]
    async fn test_cycles_never_overlap() {
        let mut scheduler = CollectionScheduler::new(Shutdown::new());
        let in_flight = counter();
        let max_seen = counter();
        let (f, m) = (in_flight.clone(), max_seen.clone());

        scheduler.register_every("slow", Duration::from_millis(1), move || {
            let (f, m) = (f.clone(), m.clone());
            async move {
                let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                f.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.shutdown(Duration::from_secs(1)).await;

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_stuck_worker_after_timeout() {
        let mut scheduler = CollectionScheduler::new(Shutdown::new());
        scheduler.register_every("stuck", Duration::from_secs(1), || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        scheduler.register_every("idle", Duration::from_secs(3600), || async { Ok(()) });

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let report = scheduler.shutdown(Duration::from_millis(200)).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.aborted, vec!["stuck".to_string()]);
        assert_eq!(report.joined, vec!["idle".to_string()]);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static msg");
        assert_eq!(panic_message(payload.as_ref()), "static msg");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned msg"));
        assert_eq!(panic_message(payload.as_ref()), "owned msg");
    }
}
