//! Keyed circuit breakers composed with retry
//!
//! [`RetryableCircuitBreaker`] owns one [`CircuitBreaker`] per string key,
//! created on first use with a shared configuration and dropped only by
//! [`RetryableCircuitBreaker::reset`]. A logical call runs its whole retry
//! sequence inside a single breaker admission, so the breaker records one
//! outcome per call regardless of how many attempts the retry made.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, instrument};

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState, ConfigResult,
    ResilienceResult,
};
use super::clock::{Clock, SystemClock};
use super::retry::{retry_with_backoff, RetryConfig};
use crate::error::ErrorClassification;

/// Registry of lazily created circuit breakers sharing one configuration.
pub struct RetryableCircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, CircuitBreaker<C>>,
    clock: Arc<C>,
}

impl<C: Clock> std::fmt::Debug for RetryableCircuitBreaker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryableCircuitBreaker")
            .field("config", &self.config)
            .field("keys", &self.breakers.len())
            .finish()
    }
}

impl RetryableCircuitBreaker<SystemClock> {
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> RetryableCircuitBreaker<C> {
    /// Build a registry whose breakers all read time from `clock`
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, breakers: DashMap::new(), clock: Arc::new(clock) })
    }

    /// Handle to the breaker for `key`, creating it if absent.
    ///
    /// Creation goes through the map's entry API, so racing callers for a new
    /// key end up sharing one breaker.
    pub fn breaker(&self, key: &str) -> CircuitBreaker<C> {
        if let Some(existing) = self.breakers.get(key) {
            return existing.clone();
        }
        self.breakers
            .entry(key.to_owned())
            .or_insert_with(|| {
                debug!(key, "creating circuit breaker");
                CircuitBreaker::from_validated(key, self.config.clone(), Arc::clone(&self.clock))
            })
            .clone()
    }

    /// Run `operation` under retry, inside the breaker for `key`.
    ///
    /// When the breaker is open the call is rejected before the first
    /// attempt. Otherwise the retried sequence counts as one success or one
    /// failure toward the breaker's state.
    #[instrument(skip(self, operation, retry), fields(max_retries = retry.max_retries))]
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        key: &str,
        operation: F,
        retry: &RetryConfig<E>,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + ErrorClassification + Send + Sync + 'static,
    {
        let breaker = self.breaker(key);
        breaker.execute(move || retry_with_backoff(operation, retry)).await
    }

    /// State of the breaker for `key`, or `None` if the key was never used
    pub fn get_circuit_state(&self, key: &str) -> Option<CircuitState> {
        self.breakers.get(key).map(|breaker| breaker.get_state())
    }

    /// Failure count of the breaker for `key`, or `None` if never used
    pub fn get_failure_count(&self, key: &str) -> Option<u64> {
        self.breakers.get(key).map(|breaker| breaker.get_failure_count())
    }

    pub fn get_metrics(&self, key: &str) -> Option<CircuitBreakerMetrics> {
        self.breakers.get(key).map(|breaker| breaker.get_metrics())
    }

    /// Drop the breaker for `key`, or every breaker when `key` is `None`.
    ///
    /// The next call for a dropped key starts from a fresh `CLOSED` breaker.
    pub fn reset(&self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.breakers.remove(key);
                debug!(key, "circuit breaker removed");
            }
            None => {
                self.breakers.clear();
                debug!("all circuit breakers removed");
            }
        }
    }

    /// Keys with a live breaker
    pub fn keys(&self) -> Vec<String> {
        self.breakers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

/// Run independent operations, each under its own keyed breaker and retry.
///
/// Operation `i` uses key `"{key_prefix}-{i}"`. All operations run
/// concurrently and one outcome is returned per operation, in input order;
/// a failure never aborts the rest of the batch.
pub async fn batch_retry_with_breaker<I, F, Fut, T, E, C>(
    operations: I,
    breaker: &RetryableCircuitBreaker<C>,
    key_prefix: &str,
    retry: &RetryConfig<E>,
) -> Vec<ResilienceResult<T, E>>
where
    I: IntoIterator<Item = F>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + ErrorClassification + Send + Sync + 'static,
    C: Clock,
{
    let calls = operations.into_iter().enumerate().map(|(index, operation)| {
        let key = format!("{key_prefix}-{index}");
        async move { breaker.execute_with_retry(&key, operation, retry).await }
    });
    join_all(calls).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::CommonError;
    use crate::resilience::clock::MockClock;

    fn registry(failure_threshold: u32) -> (RetryableCircuitBreaker<MockClock>, MockClock) {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(failure_threshold)
            .reset_timeout(Duration::from_secs(10))
            .half_open_requests(1)
            .build()
            .unwrap();
        (RetryableCircuitBreaker::with_clock(config, clock.clone()).unwrap(), clock)
    }

    fn no_delay(max_retries: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::ZERO)
            .max_delay(Duration::ZERO)
            .build()
            .unwrap()
    }

    /// Validates the single-failure end-to-end scenario.
    ///
    /// Assertions:
    /// - With `failure_threshold = 1` and `max_retries = 0`, one failing call
    ///   leaves `"api"` with failure count 1 and state `Open`.
    #[tokio::test]
    async fn test_failing_call_opens_keyed_circuit() {
        let (cb, _) = registry(1);

        let result = cb
            .execute_with_retry(
                "api",
                || async { Err::<(), _>(CommonError::server(500, "down")) },
                &no_delay(0),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(cb.get_failure_count("api"), Some(1));
        assert_eq!(cb.get_circuit_state("api"), Some(CircuitState::Open));
    }

    /// Validates that exhausted retries count as one breaker failure.
    ///
    /// Assertions:
    /// - Three attempts run, the breaker records a single failure.
    #[tokio::test]
    async fn test_retried_sequence_counts_once() {
        let (cb, _) = registry(5);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let _ = cb
            .execute_with_retry(
                "devices",
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(CommonError::network("reset"))
                    }
                },
                &no_delay(2),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cb.get_failure_count("devices"), Some(1));
    }

    /// Validates that an open circuit stops retries before the first attempt.
    ///
    /// Assertions:
    /// - After opening, a further call never invokes the operation.
    #[tokio::test]
    async fn test_open_circuit_skips_retries() {
        let (cb, _) = registry(1);
        let _ = cb
            .execute_with_retry("api", || async { Err::<(), _>(CommonError::network("x")) }, &no_delay(0))
            .await;

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = cb
            .execute_with_retry(
                "api",
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, CommonError>(())
                    }
                },
                &no_delay(3),
            )
            .await;

        assert!(result.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_keys_report_none() {
        let (cb, _) = registry(3);
        assert_eq!(cb.get_circuit_state("never-used"), None);
        assert_eq!(cb.get_failure_count("never-used"), None);
        assert!(cb.keys().is_empty());
    }

    /// Validates `reset` with and without a key.
    ///
    /// Assertions:
    /// - Resetting one key leaves the other intact.
    /// - Resetting without a key removes every breaker.
    #[tokio::test]
    async fn test_reset_single_and_all() {
        let (cb, _) = registry(1);
        for key in ["a", "b"] {
            let _ = cb
                .execute_with_retry(key, || async { Err::<(), _>(CommonError::network("x")) }, &no_delay(0))
                .await;
        }

        cb.reset(Some("a"));
        assert_eq!(cb.get_circuit_state("a"), None);
        assert_eq!(cb.get_circuit_state("b"), Some(CircuitState::Open));

        cb.reset(None);
        assert!(cb.keys().is_empty());

        let ok = cb.execute_with_retry("a", || async { Ok::<_, CommonError>(1) }, &no_delay(0)).await;
        assert_eq!(ok.unwrap(), 1);
    }

    /// Validates that breakers recover through half-open on the shared clock.
    ///
    /// Assertions:
    /// - After the reset timeout a successful call closes the circuit.
    #[tokio::test]
    async fn test_keyed_breaker_recovers_after_timeout() {
        let (cb, clock) = registry(1);
        let _ = cb
            .execute_with_retry("api", || async { Err::<(), _>(CommonError::network("x")) }, &no_delay(0))
            .await;

        clock.advance(Duration::from_secs(10));
        let ok = cb.execute_with_retry("api", || async { Ok::<_, CommonError>(()) }, &no_delay(0)).await;

        assert!(ok.is_ok());
        assert_eq!(cb.get_circuit_state("api"), Some(CircuitState::Closed));
    }

    /// Validates batch execution reports one ordered outcome per operation.
    ///
    /// Assertions:
    /// - Results are `[Ok(0), Err, Ok(2)]`.
    /// - Each operation got its own key.
    #[tokio::test]
    async fn test_batch_reports_every_outcome_in_order() {
        let (cb, _) = registry(1);
        let operations = (0..3u32).map(|index| {
            move || async move {
                if index == 1 {
                    Err(CommonError::validation("device", "bad id"))
                } else {
                    Ok(index)
                }
            }
        });

        let results = batch_retry_with_breaker(operations, &cb, "details", &no_delay(1)).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &0);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap(), &2);
        assert_eq!(cb.get_circuit_state("details-1"), Some(CircuitState::Open));
        assert_eq!(cb.get_circuit_state("details-0"), Some(CircuitState::Closed));
    }
}
