//! Resilience wiring shared by every backend call

use std::future::Future;
use std::sync::Arc;

use mdmlink_common::error::{CommonError, CommonResult};
use mdmlink_common::resilience::{
    CircuitBreakerConfig, ConcurrencyLimiter, RetryConfig, RetryableCircuitBreaker, SharedLimiter,
};
use mdmlink_domain::{BreakerSettings, Config, ResilienceSettings};

/// Retry policy, keyed breakers and the fan-out limiter, built once per
/// process from configuration.
#[derive(Debug)]
pub struct ResilienceStack {
    retry: RetryConfig,
    breakers: RetryableCircuitBreaker,
    limiter: SharedLimiter,
}

impl ResilienceStack {
    pub fn new(
        retry: RetryConfig,
        breaker: CircuitBreakerConfig,
        max_concurrency: usize,
    ) -> CommonResult<Self> {
        retry.validate()?;
        Ok(Self {
            retry,
            breakers: RetryableCircuitBreaker::new(breaker)?,
            limiter: Arc::new(ConcurrencyLimiter::new(max_concurrency)?),
        })
    }

    pub fn from_config(config: &Config) -> CommonResult<Self> {
        Self::new(
            retry_config(&config.resilience)?,
            breaker_config(&config.breaker)?,
            config.resilience.max_concurrency,
        )
    }

    /// Run `operation` under retry inside the breaker for `key`.
    ///
    /// Breaker rejections surface as `CommonError::CircuitOpen`; operation
    /// failures come back exactly as the last attempt produced them.
    pub async fn call<T, F, Fut>(&self, key: &str, operation: F) -> CommonResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CommonResult<T>>,
    {
        self.breakers.execute_with_retry(key, operation, &self.retry).await.map_err(CommonError::from)
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn breakers(&self) -> &RetryableCircuitBreaker {
        &self.breakers
    }

    pub fn limiter(&self) -> &SharedLimiter {
        &self.limiter
    }
}

/// Retry policy from the environment-driven settings
pub fn retry_config(settings: &ResilienceSettings) -> CommonResult<RetryConfig> {
    Ok(RetryConfig::builder()
        .max_retries(settings.max_retries)
        .initial_delay(settings.initial_delay())
        .max_delay(settings.max_delay())
        .backoff_multiplier(settings.retry_backoff_multiplier)
        .debug_mode(settings.debug_mode)
        .build()?)
}

pub fn breaker_config(settings: &BreakerSettings) -> CommonResult<CircuitBreakerConfig> {
    Ok(CircuitBreakerConfig::builder()
        .failure_threshold(settings.failure_threshold)
        .reset_timeout(settings.reset_timeout())
        .half_open_requests(settings.half_open_requests)
        .build()?)
}
