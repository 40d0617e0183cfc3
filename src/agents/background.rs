//! Bounded pool for detached, best-effort work
//!
//! Session refreshes and rolling summaries run here. Tasks are never joined
//! by the request that submitted them; each carries its own deadline and
//! failures are only logged.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};

use crate::agents::error::AgentResult;

/// Counters for background work
#[derive(Debug, Default)]
pub struct BackgroundStats {
    pub spawned: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundStatsSnapshot {
    pub spawned: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub in_flight: usize,
}

struct Inner {
    semaphore: Semaphore,
    stats: BackgroundStats,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count even if the task panics
struct InFlightGuard(Arc<Inner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

impl BackgroundTasks {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                semaphore: Semaphore::new(max_concurrent.max(1)),
                stats: BackgroundStats::default(),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Run `task` detached with its own deadline
    pub fn spawn<F>(&self, name: &'static str, deadline: Duration, task: F)
    where
        F: Future<Output = AgentResult<()>> + Send + 'static,
    {
        let inner = self.inner.clone();
        inner.in_flight.fetch_add(1, Ordering::AcqRel);
        inner.stats.spawned.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let guard = InFlightGuard(inner.clone());

            let _permit = match inner.semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!(task = name, "Background pool closed, dropping task");
                    drop(guard);
                    return;
                }
            };

            match tokio::time::timeout(deadline, task).await {
                Ok(Ok(())) => {
                    inner.stats.completed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(task = name, "Background task completed");
                }
                Ok(Err(e)) => {
                    inner.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(task = name, error = %e, "Background task failed");
                }
                Err(_) => {
                    inner.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(task = name, timeout_ms = deadline.as_millis() as u64, "Background task timed out");
                }
            }

            drop(guard);
        });
    }

    /// Wait until no submitted task is pending or running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn stats(&self) -> BackgroundStatsSnapshot {
        let stats = &self.inner.stats;
        BackgroundStatsSnapshot {
            spawned: stats.spawned.load(Ordering::Relaxed),
            completed: stats.completed.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
            timed_out: stats.timed_out.load(Ordering::Relaxed),
            in_flight: self.inner.in_flight.load(Ordering::Acquire),
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::error::AgentError;

    #[tokio::test]
    async fn test_outcomes_are_counted() {
        let pool = BackgroundTasks::new(2);

        pool.spawn("ok", Duration::from_secs(1), async { Ok(()) });
        pool.spawn("fail", Duration::from_secs(1), async {
            Err(AgentError::Internal("boom".into()))
        });
        pool.spawn("slow", Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        });

        pool.wait_idle().await;
        let stats = pool.stats();
        assert_eq!(stats.spawned, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_wait_idle_with_nothing_submitted() {
        BackgroundTasks::default().wait_idle().await;
    }
}
