//! Retry with exponential backoff
//!
//! [`retry_with_backoff`] runs an operation, and on a retryable failure
//! sleeps for `min(max_delay, initial_delay * backoff_multiplier^n)` before
//! the next attempt, where `n` is the zero-based retry index. A failure that
//! carries a mandated delay ([`ErrorClassification::retry_after`]) uses that
//! delay verbatim instead.
//!
//! With `max_retries = N` a persistently failing operation is attempted
//! exactly `N + 1` times. The last error is returned unchanged.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};
use crate::error::{CommonError, ErrorClassification};

/// Decides whether a failed attempt may be retried.
pub type RetryCondition<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Observer called before each retry with the error, the 1-based retry
/// number and the delay about to be slept.
pub type RetryObserver<E> = Arc<dyn Fn(&E, u32, Duration) + Send + Sync>;

/// Retry configuration
///
/// Immutable once built; clone it to derive variants.
pub struct RetryConfig<E = CommonError> {
    /// Retries beyond the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Ceiling for the computed backoff delay
    pub max_delay: Duration,
    /// Exponential growth factor between retries
    pub backoff_multiplier: f64,
    /// Emit a log line for every retry
    pub debug_mode: bool,
    retry_condition: Option<RetryCondition<E>>,
    on_retry: Option<RetryObserver<E>>,
}

impl<E> Clone for RetryConfig<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_multiplier: self.backoff_multiplier,
            debug_mode: self.debug_mode,
            retry_condition: self.retry_condition.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("debug_mode", &self.debug_mode)
            .field("custom_condition", &self.retry_condition.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl<E> Default for RetryConfig<E> {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            debug_mode: false,
            retry_condition: None,
            on_retry: None,
        }
    }
}

impl<E> RetryConfig<E> {
    /// Create a configuration builder seeded with defaults
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::new()
    }

    /// Same configuration with a different retry ceiling
    pub fn with_max_retries(&self, max_retries: u32) -> Self {
        Self { max_retries, ..self.clone() }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(format!(
                "backoff_multiplier must be a finite value >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Computed backoff before retry number `attempt_index + 1`
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_nanos() as f64);
        Duration::from_nanos(capped.round() as u64)
    }
}

impl<E: ErrorClassification> RetryConfig<E> {
    /// Whether `error` may be retried under this configuration
    ///
    /// Uses the custom condition when one is set, otherwise the error's own
    /// classification.
    pub fn should_retry(&self, error: &E) -> bool {
        match &self.retry_condition {
            Some(condition) => condition(error),
            None => error.is_retryable(),
        }
    }

    /// Delay before retry number `attempt_index + 1` after `error`
    pub fn delay_for(&self, attempt_index: u32, error: &E) -> Duration {
        error.retry_after().unwrap_or_else(|| self.backoff_delay(attempt_index))
    }
}

/// Builder for RetryConfig
pub struct RetryConfigBuilder<E = CommonError> {
    config: RetryConfig<E>,
}

impl<E> Default for RetryConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RetryConfigBuilder<E> {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    /// Replace the default classification-based retry decision
    pub fn retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.config.retry_condition = Some(Arc::new(condition));
        self
    }

    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&E, u32, Duration) + Send + Sync + 'static,
    {
        self.config.on_retry = Some(Arc::new(observer));
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig<E>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// exhausts `config.max_retries`.
///
/// Attempts are strictly sequential. The returned error is the one produced
/// by the last attempt, never wrapped.
#[instrument(skip_all, fields(max_retries = config.max_retries))]
pub async fn retry_with_backoff<F, Fut, T, E>(mut operation: F, config: &RetryConfig<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ErrorClassification + fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 && config.debug_mode {
                    debug!(retries = attempt, "operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(error) => {
                if attempt >= config.max_retries {
                    if config.max_retries > 0 {
                        warn!(attempts = attempt + 1, error = %error, "retry attempts exhausted");
                    }
                    return Err(error);
                }

                if !config.should_retry(&error) {
                    debug!(error = %error, "error is not retryable");
                    return Err(error);
                }

                let delay = config.delay_for(attempt, &error);
                attempt += 1;

                if let Some(observer) = &config.on_retry {
                    observer(&error, attempt, delay);
                }
                if config.debug_mode {
                    debug!(
                        attempt,
                        max_retries = config.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "retrying after backoff"
                    );
                }

                sleep(delay).await;
            }
        }
    }
}

/// An operation bundled with the retry configuration it always runs under.
///
/// Built by [`with_retry`].
pub struct Retrying<F, E = CommonError> {
    operation: F,
    config: RetryConfig<E>,
}

/// Wrap `operation` so every call goes through [`retry_with_backoff`].
///
/// ```rust,ignore
/// let fetch = with_retry(|id: String| client.device(id), RetryConfig::default());
/// let device = fetch.call("42".to_string()).await?;
/// ```
pub fn with_retry<F, E>(operation: F, config: RetryConfig<E>) -> Retrying<F, E> {
    Retrying { operation, config }
}

impl<F, E> Retrying<F, E> {
    /// Invoke the wrapped operation with `args`, cloning them per attempt
    pub async fn call<A, Fut, T>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        A: Clone,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorClassification + fmt::Display,
    {
        retry_with_backoff(|| (self.operation)(args.clone()), &self.config).await
    }

    pub fn config(&self) -> &RetryConfig<E> {
        &self.config
    }
}
