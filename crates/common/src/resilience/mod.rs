//! Resilience patterns for calls against an unreliable backend
//!
//! - **Retry**: exponential backoff with classification-driven retry
//!   decisions and upstream-mandated delays
//! - **Circuit Breaker**: `CLOSED`/`OPEN`/`HALF_OPEN` state machine that
//!   fails fast once a dependency is unhealthy
//! - **Retryable Circuit Breaker**: keyed breaker registry that runs a whole
//!   retried call inside one breaker admission
//! - **Concurrency Limiter**: FIFO semaphore bounding fan-out
//! - **Timeout**: races a call against a timer
//!
//! Every pattern is generic over the operation's error type and testable
//! through the [`Clock`] abstraction or tokio's paused clock.

pub mod circuit_breaker;
pub mod clock;
pub mod limiter;
pub mod retry;
pub mod retryable;
pub mod timeout;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitState, ConfigError, ConfigResult, ResilienceError, ResilienceResult,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use limiter::{ConcurrencyLimiter, LimiterStats, SharedLimiter};
pub use retry::{
    retry_with_backoff, with_retry, RetryCondition, RetryConfig, RetryConfigBuilder,
    RetryObserver, Retrying,
};
pub use retryable::{batch_retry_with_breaker, RetryableCircuitBreaker};
pub use timeout::with_timeout;
