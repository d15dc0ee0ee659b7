//! Circuit breaker state machine
//!
//! A breaker starts `CLOSED` and counts consecutive failures. Reaching the
//! failure threshold moves it to `OPEN`, where every call is rejected without
//! touching the wrapped operation. Once the reset timeout has elapsed since
//! the most recent failure, the next call moves the breaker to `HALF_OPEN`
//! and is attempted. In `HALF_OPEN` a single failure reopens the circuit and
//! restarts the timer; `half_open_requests` consecutive successes close it.
//!
//! The failure counter is cleared by any success while `CLOSED` and by the
//! transition back to `CLOSED`. Reopening from `HALF_OPEN` keeps counting on
//! top of the previous value, so [`CircuitBreaker::get_failure_count`]
//! reports every failure since the circuit last closed.
//!
//! All state lives behind a single mutex. The admission check and the
//! outcome update are separate critical sections around the awaited
//! operation, so concurrent calls on one breaker interleave the way the
//! state machine expects: each call is admitted against the state it saw and
//! reports its own outcome.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid { message: message.into() }
    }
}

impl From<ConfigError> for CommonError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid { message } => CommonError::config(message),
        }
    }
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur in resilience operations
///
/// Generic over the operation's error type `E` so the original failure is
/// preserved untouched inside `OperationFailed`.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker is open for '{name}', rejecting calls")]
    CircuitOpen { name: String },

    /// The underlying operation failed
    #[error("{source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// `true` when the call was rejected without running the operation.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Borrow the operation's own error, if the operation ran.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::OperationFailed { source } => Some(source),
            Self::CircuitOpen { .. } => None,
        }
    }

    /// Take the operation's own error, if the operation ran.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationFailed { source } => Some(source),
            Self::CircuitOpen { .. } => None,
        }
    }
}

impl<E> ErrorClassification for ResilienceError<E>
where
    E: std::error::Error + ErrorClassification + Send + Sync + 'static,
{
    fn is_retryable(&self) -> bool {
        match self {
            Self::CircuitOpen { .. } => false,
            Self::OperationFailed { source } => source.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CircuitOpen { .. } => ErrorSeverity::Warning,
            Self::OperationFailed { source } => source.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        self.operation_error().is_some_and(ErrorClassification::is_critical)
    }

    fn retry_after(&self) -> Option<Duration> {
        self.operation_error().and_then(ErrorClassification::retry_after)
    }
}

impl<E> From<ResilienceError<E>> for CommonError
where
    E: std::error::Error + Into<CommonError> + Send + Sync + 'static,
{
    fn from(err: ResilienceError<E>) -> Self {
        match err {
            ResilienceError::CircuitOpen { name } => CommonError::circuit_open(name),
            ResilienceError::OperationFailed { source } => source.into(),
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

//==============================================================================
// State & Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, trial requests decide whether it closes
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `CLOSED` before the circuit opens
    pub failure_threshold: u32,
    /// Time `OPEN` must persist before a trial call is admitted
    pub reset_timeout: Duration,
    /// Successes required in `HALF_OPEN` to close the circuit
    pub half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(60), half_open_requests: 3 }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }

        if self.half_open_requests == 0 {
            return Err(ConfigError::invalid("half_open_requests must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    pub fn half_open_requests(mut self, requests: u32) -> Self {
        self.config.half_open_requests = requests;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u64,
    pub half_open_successes: u64,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub rejected_calls: u64,
    pub last_failure_time: Option<Instant>,
    pub state_change_time: Instant,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u64,
    half_open_successes: u64,
    last_failure_time: Option<Instant>,
    state_change_time: Instant,
    total_calls: u64,
    total_successes: u64,
    total_failures: u64,
    rejected_calls: u64,
}

impl BreakerState {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            half_open_successes: 0,
            last_failure_time: None,
            state_change_time: now,
            total_calls: 0,
            total_successes: 0,
            total_failures: 0,
            rejected_calls: 0,
        }
    }

    fn transition(&mut self, to: CircuitState, now: Instant) {
        self.state = to;
        self.state_change_time = now;
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Generic circuit breaker implementation
///
/// Cloning yields another handle onto the same state.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: C,
    ) -> ConfigResult<Self> {
        Self::with_shared_clock(name, config, Arc::new(clock))
    }

    /// Create a breaker that shares its clock with other breakers.
    pub fn with_shared_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<C>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(name, config, clock))
    }

    pub(crate) fn from_validated(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<C>,
    ) -> Self {
        let now = clock.now();
        Self {
            name: Arc::from(name.into()),
            config,
            inner: Arc::new(Mutex::new(BreakerState::new(now))),
            clock,
        }
    }

    /// Name reported in rejections and log fields
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration this breaker was built with
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Admit or reject a call, performing the `OPEN -> HALF_OPEN` transition
    /// when the reset timeout has elapsed.
    ///
    /// Every admitted call must be followed by exactly one of
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let admitted = match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                // Timed from entering OPEN; late failures must not extend it.
                let elapsed = now.saturating_duration_since(inner.state_change_time);
                if elapsed >= self.config.reset_timeout {
                    inner.transition(CircuitState::HalfOpen, now);
                    inner.half_open_successes = 0;
                    info!(breaker = %self.name, "circuit breaker half-open, admitting trial call");
                    true
                } else {
                    false
                }
            }
        };

        if admitted {
            inner.total_calls += 1;
        } else {
            inner.rejected_calls += 1;
        }
        admitted
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Rejects with [`ResilienceError::CircuitOpen`] without calling
    /// `operation` while the circuit is open.
    #[instrument(skip(self, operation), fields(breaker = %self.name))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.try_acquire() {
            debug!("circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen { name: self.name.to_string() });
        }

        match operation().await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(error) => {
                self.record_failure();
                debug!(error = %error, "circuit breaker recorded failure");
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.total_successes += 1;

        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= u64::from(self.config.half_open_requests) {
                    inner.transition(CircuitState::Closed, now);
                    inner.failure_count = 0;
                    inner.half_open_successes = 0;
                    inner.last_failure_time = None;
                    info!(breaker = %self.name, "circuit breaker closed");
                }
            }
            CircuitState::Open => {
                // A call admitted before a sibling reopened the circuit.
                debug!(breaker = %self.name, "success recorded while open, ignored");
            }
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.total_failures += 1;
        inner.last_failure_time = Some(now);

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= u64::from(self.config.failure_threshold) {
                    inner.transition(CircuitState::Open, now);
                    warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.transition(CircuitState::Open, now);
                inner.half_open_successes = 0;
                warn!(breaker = %self.name, "circuit breaker reopened by half-open failure");
            }
            CircuitState::Open => {}
        }
    }

    /// Get the current state of the circuit breaker
    ///
    /// Does not perform the time-based `OPEN -> HALF_OPEN` transition; that
    /// happens on the next admitted call.
    pub fn get_state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Failures counted since the circuit last closed or saw a success
    pub fn get_failure_count(&self) -> u64 {
        self.inner.lock().failure_count
    }

    /// Get circuit breaker metrics
    pub fn get_metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        CircuitBreakerMetrics {
            state: inner.state,
            failure_count: inner.failure_count,
            half_open_successes: inner.half_open_successes,
            total_calls: inner.total_calls,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            rejected_calls: inner.rejected_calls,
            last_failure_time: inner.last_failure_time,
            state_change_time: inner.state_change_time,
        }
    }

    /// Return to `CLOSED` with all counters cleared
    pub fn reset(&self) {
        let now = self.clock.now();
        *self.inner.lock() = BreakerState::new(now);
        info!(breaker = %self.name, "circuit breaker reset");
    }
}
