//! Shared building blocks for the mdmlink crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: the error taxonomy
//! - `observability`: tracing instrumentation
//! - `runtime`: async infrastructure (cache, resilience, lifecycle)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod lifecycle;
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use cache::{BoundedCache, BoundedCacheConfig, CacheStats};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorKind, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use lifecycle::{LifecycleController, ManagerLifecycle, ManagerStatus, ShutdownReport};
#[cfg(feature = "runtime")]
pub use resilience::{
    batch_retry_with_breaker, retry_with_backoff, with_retry, with_timeout, CircuitBreaker,
    CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitState,
    Clock, ConcurrencyLimiter, LimiterStats, MockClock, ResilienceError, ResilienceResult,
    RetryConfig, RetryConfigBuilder, RetryableCircuitBreaker, SystemClock,
};
