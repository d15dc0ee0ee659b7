//! Concurrency limiter for fan-out operations
//!
//! Bounds the number of in-flight futures to `max_concurrency`. Callers
//! beyond the bound wait on a tokio semaphore, which hands out permits in
//! arrival order. The permit is tied to a guard, so a slot is released when
//! the operation finishes, fails, panics or is dropped mid-flight.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{trace, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};

/// Point-in-time view of a limiter
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LimiterStats {
    /// Configured width
    pub max_concurrency: usize,
    /// Operations currently holding a slot
    pub running: usize,
    /// Callers waiting for a slot
    pub waiting: usize,
    /// Operations that have released their slot
    pub completed: u64,
    /// Highest `running` value observed
    pub peak_running: usize,
}

impl LimiterStats {
    /// Fraction of slots in use (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        self.running as f64 / self.max_concurrency as f64
    }
}

#[derive(Debug, Default)]
struct Counters {
    running: AtomicUsize,
    waiting: AtomicUsize,
    completed: AtomicU64,
    peak_running: AtomicUsize,
}

struct Slot<'a> {
    counters: &'a Counters,
    _permit: Option<SemaphorePermit<'a>>,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.counters.running.fetch_sub(1, Ordering::AcqRel);
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counts a caller in `waiting` until it leaves the queue, even when its
/// future is dropped before a permit arrives.
struct Queued<'a> {
    counters: &'a Counters,
}

impl<'a> Queued<'a> {
    fn enter(counters: &'a Counters) -> Self {
        counters.waiting.fetch_add(1, Ordering::AcqRel);
        Self { counters }
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        self.counters.waiting.fetch_sub(1, Ordering::AcqRel);
    }
}

/// FIFO semaphore bounding simultaneously running operations
///
/// # Examples
///
/// ```rust
/// use mdmlink_common::resilience::ConcurrencyLimiter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = ConcurrencyLimiter::new(2)?;
///
/// let results = limiter
///     .map_settled(vec![1, 2, 3], |n| async move {
///         if n == 2 { Err("unreachable device") } else { Ok(n * 10) }
///     })
///     .await;
///
/// assert_eq!(results, vec![Ok(10), Err("unreachable device"), Ok(30)]);
/// # Ok(())
/// # }
/// ```
pub struct ConcurrencyLimiter {
    max_concurrency: usize,
    semaphore: Semaphore,
    counters: Counters,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting `max_concurrency` operations at once
    pub fn new(max_concurrency: usize) -> ConfigResult<Self> {
        if max_concurrency == 0 {
            return Err(ConfigError::invalid("max_concurrency must be greater than 0"));
        }
        Ok(Self {
            max_concurrency,
            semaphore: Semaphore::new(max_concurrency),
            counters: Counters::default(),
        })
    }

    async fn acquire(&self) -> Slot<'_> {
        let permit = {
            let _queued = Queued::enter(&self.counters);
            self.semaphore.acquire().await
        };

        // The semaphore is private and never closed.
        let permit = match permit {
            Ok(permit) => Some(permit),
            Err(err) => {
                warn!(error = %err, "limiter semaphore closed, running unthrottled");
                None
            }
        };

        let running = self.counters.running.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.peak_running.fetch_max(running, Ordering::AcqRel);
        trace!(running, max = self.max_concurrency, "limiter slot acquired");

        Slot { counters: &self.counters, _permit: permit }
    }

    /// Run `operation` once a slot is free, returning its output unchanged
    pub async fn run<F, Fut>(&self, operation: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _slot = self.acquire().await;
        operation().await
    }

    /// Apply `f` to every item through [`run`](Self::run).
    ///
    /// Returns one settled result per item, in input order. A failing item
    /// never prevents the others from completing.
    pub async fn map_settled<I, F, Fut, T, E>(&self, items: I, f: F) -> Vec<Result<T, E>>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let f = &f;
        join_all(items.into_iter().map(|item| self.run(move || f(item)))).await
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn running(&self) -> usize {
        self.counters.running.load(Ordering::Acquire)
    }

    pub fn waiting(&self) -> usize {
        self.counters.waiting.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            max_concurrency: self.max_concurrency,
            running: self.running(),
            waiting: self.waiting(),
            completed: self.counters.completed.load(Ordering::Acquire),
            peak_running: self.counters.peak_running.load(Ordering::Acquire),
        }
    }
}

impl fmt::Debug for ConcurrencyLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrencyLimiter")
            .field("max_concurrency", &self.max_concurrency)
            .field("running", &self.running())
            .field("waiting", &self.waiting())
            .finish()
    }
}

/// Shared handle type used by components that fan out through one limiter
pub type SharedLimiter = Arc<ConcurrencyLimiter>;
