//! Error taxonomy shared by every mdmlink crate.
//!
//! Failed backend calls surface a single tagged type, [`CommonError`], whose
//! [`ErrorKind`] discriminant drives retry decisions. Callers switch on the
//! kind instead of testing concrete types.
//!
//! # Retry eligibility
//!
//! | Kind | Typical origin | Retryable |
//! |------|----------------|-----------|
//! | `Network` | connection refused, reset, DNS | yes |
//! | `Timeout` | timer won the race against a call | yes |
//! | `Server` | HTTP status >= 500 | yes |
//! | `RateLimited` | HTTP 429, carries `retry_after` | yes |
//! | `Authentication` | HTTP 401 | no |
//! | `PermissionDenied` | HTTP 403 | no |
//! | `NotFound` | HTTP 404 | no |
//! | `Validation` | other 4xx, bad input | no |
//! | `CapabilityUnavailable` | mutation without a writable backend | no |
//! | `CircuitOpen` | breaker rejected the call | no |
//! | `NoSuitableBackend` | every backend variant failed detection | no |
//!
//! A rate-limited error always carries a `retry_after` duration. Retry
//! executors use it verbatim in place of the computed backoff delay.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//!
//! use mdmlink_common::error::{CommonError, ErrorClassification, ErrorKind};
//!
//! let err = CommonError::rate_limited(Duration::from_secs(2));
//! assert_eq!(err.kind(), ErrorKind::RateLimited);
//! assert!(err.is_retryable());
//! assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
//! ```

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Discriminant of a [`CommonError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Timeout,
    Server,
    RateLimited,
    Authentication,
    PermissionDenied,
    NotFound,
    Validation,
    CapabilityUnavailable,
    CircuitOpen,
    NoSuitableBackend,
    Config,
    Serialization,
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name used in structured log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Server => "server",
            Self::RateLimited => "rate_limited",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::CapabilityUnavailable => "capability_unavailable",
            Self::CircuitOpen => "circuit_open",
            Self::NoSuitableBackend => "no_suitable_backend",
            Self::Config => "config",
            Self::Serialization => "serialization",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure of a backend call or of the resilience layer itself.
#[derive(Debug, Clone, PartialEq)]
pub enum CommonError {
    /// Connection-level failure (refused, reset, DNS, TLS)
    Network { message: String },

    /// A timer won the race against the operation
    Timeout { operation: String, duration: Duration },

    /// Upstream answered with a 5xx status
    Server { status: u16, message: String },

    /// Upstream throttled the call (HTTP 429)
    RateLimited { retry_after: Duration, message: Option<String> },

    /// Credentials were rejected (HTTP 401)
    Authentication { message: String },

    /// Credentials are valid but lack the privilege (HTTP 403)
    PermissionDenied { resource: String, message: Option<String> },

    /// Resource does not exist
    NotFound { resource_type: String, identifier: Option<String> },

    /// Client-side input rejected (400-class)
    Validation { field: String, message: String },

    /// No backend able to serve a mutating operation
    CapabilityUnavailable { operation: String, reason: String },

    /// Circuit breaker is open for the given key
    CircuitOpen { key: String },

    /// Backend detection exhausted every strategy
    NoSuitableBackend { message: String },

    /// Invalid or missing configuration
    Config { message: String, field: Option<String> },

    /// Payload could not be encoded or decoded
    Serialization { message: String, format: Option<String> },

    /// Invariant violation
    Internal { message: String, context: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { message } => write!(f, "Network error: {}", message),
            Self::Timeout { operation, duration } => {
                write!(f, "Operation '{}' timed out after {:?}", operation, duration)
            }
            Self::Server { status, message } => {
                write!(f, "Server error (status {}): {}", status, message)
            }
            Self::RateLimited { retry_after, message } => {
                if let Some(message) = message {
                    write!(f, "Rate limit exceeded (retry in {:?}): {}", retry_after, message)
                } else {
                    write!(f, "Rate limit exceeded (retry in {:?})", retry_after)
                }
            }
            Self::Authentication { message } => write!(f, "Authentication failed: {}", message),
            Self::PermissionDenied { resource, message } => {
                if let Some(message) = message {
                    write!(f, "Permission denied for '{}': {}", resource, message)
                } else {
                    write!(f, "Permission denied for '{}'", resource)
                }
            }
            Self::NotFound { resource_type, identifier } => {
                if let Some(id) = identifier {
                    write!(f, "{} not found: '{}'", resource_type, id)
                } else {
                    write!(f, "{} not found", resource_type)
                }
            }
            Self::Validation { field, message } => {
                write!(f, "Validation error for field '{}': {}", field, message)
            }
            Self::CapabilityUnavailable { operation, reason } => {
                write!(f, "Capability unavailable for '{}': {}", operation, reason)
            }
            Self::CircuitOpen { key } => {
                write!(f, "Circuit breaker is open for '{}', rejecting calls", key)
            }
            Self::NoSuitableBackend { message } => {
                write!(f, "No suitable backend found: {}", message)
            }
            Self::Config { message, field } => {
                if let Some(field) = field {
                    write!(f, "Configuration error in field '{}': {}", field, message)
                } else {
                    write!(f, "Configuration error: {}", message)
                }
            }
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "Serialization error ({}): {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Internal { message, context } => {
                if let Some(ctx) = context {
                    write!(f, "Internal error in '{}': {}", ctx, message)
                } else {
                    write!(f, "Internal error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Server | ErrorKind::RateLimited
        )
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Info,
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::CircuitOpen { .. }
            | Self::PermissionDenied { .. } => ErrorSeverity::Warning,
            Self::Internal { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

impl CommonError {
    /// Discriminant used by retry conditions and log fields.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Server { .. } => ErrorKind::Server,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::CapabilityUnavailable { .. } => ErrorKind::CapabilityUnavailable,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::NoSuitableBackend { .. } => ErrorKind::NoSuitableBackend,
            Self::Config { .. } => ErrorKind::Config,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network { message: message.into() }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a server error for a 5xx status
    pub fn server<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Server { status, message: message.into() }
    }

    /// Create a rate limit error with its mandatory retry delay
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after, message: None }
    }

    /// Create a rate limit error with a message from the upstream
    pub fn rate_limited_with_message<S: Into<String>>(retry_after: Duration, message: S) -> Self {
        Self::RateLimited { retry_after, message: Some(message.into()) }
    }

    /// Create an authentication error
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication { message: message.into() }
    }

    /// Create a permission denied error
    pub fn permission_denied<S: Into<String>>(resource: S) -> Self {
        Self::PermissionDenied { resource: resource.into(), message: None }
    }

    /// Create a permission denied error with an upstream message
    pub fn permission_denied_with_message<S: Into<String>, M: Into<String>>(
        resource: S,
        message: M,
    ) -> Self {
        Self::PermissionDenied { resource: resource.into(), message: Some(message.into()) }
    }

    /// Create a not found error
    pub fn not_found<T: Into<String>>(resource_type: T) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: None }
    }

    /// Create a not found error with identifier
    pub fn not_found_with_id<T: Into<String>, I: Into<String>>(
        resource_type: T,
        identifier: I,
    ) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: Some(identifier.into()) }
    }

    /// Create a validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Create a capability unavailable error
    pub fn capability_unavailable<O: Into<String>, R: Into<String>>(
        operation: O,
        reason: R,
    ) -> Self {
        Self::CapabilityUnavailable { operation: operation.into(), reason: reason.into() }
    }

    /// Create a circuit open error
    pub fn circuit_open<S: Into<String>>(key: S) -> Self {
        Self::CircuitOpen { key: key.into() }
    }

    /// Create a no suitable backend error
    pub fn no_suitable_backend<S: Into<String>>(message: S) -> Self {
        Self::NoSuitableBackend { message: message.into() }
    }

    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error for a specific field
    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), context: None }
    }

    /// Create an internal error with context
    pub fn internal_with_context<S: Into<String>, C: Into<String>>(message: S, context: C) -> Self {
        Self::Internal { message: message.into(), context: Some(context.into()) }
    }

    /// Convert error to structured logging fields
    ///
    /// ```rust,ignore
    /// let fields = err.as_tracing_fields();
    /// warn!(error_kind = %fields[0].1, "backend call failed");
    /// ```
    pub fn as_tracing_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("error_kind", self.kind().as_str().to_string())];

        match self {
            Self::Timeout { operation, duration } => {
                fields.push(("operation", operation.clone()));
                fields.push(("duration_ms", duration.as_millis().to_string()));
            }
            Self::Server { status, .. } => fields.push(("status", status.to_string())),
            Self::RateLimited { retry_after, .. } => {
                fields.push(("retry_after_ms", retry_after.as_millis().to_string()));
            }
            Self::CapabilityUnavailable { operation, .. } => {
                fields.push(("operation", operation.clone()));
            }
            Self::CircuitOpen { key } => fields.push(("key", key.clone())),
            Self::Validation { field, .. } => fields.push(("field", field.clone())),
            _ => {}
        }

        fields.push(("message", self.to_string()));
        fields
    }
}

/// Standard trait for error classification
///
/// Implemented by every error type that flows through the retry executor.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: network failures, timeouts, 5xx
    /// responses and rate limiting.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the mandated retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the upstream dictated a delay (e.g. a
    /// Retry-After header). Retry executors use it in place of their own
    /// backoff computation.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// Standard conversions from common error types
impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::internal_with_context(err.to_string(), "io")
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the error taxonomy
    //!
    //! Tests cover display formatting, retry classification, severity and
    //! the retry-after contract of rate-limited errors.

    use super::*;

    /// Validates that transient kinds are classified retryable.
    ///
    /// Assertions:
    /// - Network, timeout, server and rate-limited errors are retryable.
    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(CommonError::network("connection reset").is_retryable());
        assert!(CommonError::timeout("probe", Duration::from_secs(1)).is_retryable());
        assert!(CommonError::server(503, "unavailable").is_retryable());
        assert!(CommonError::rate_limited(Duration::from_millis(250)).is_retryable());
    }

    /// Validates that client-side and capability errors are never retried.
    ///
    /// Assertions:
    /// - Authentication, permission, validation, capability, circuit and
    ///   backend-selection errors report `is_retryable() == false`.
    #[test]
    fn test_client_errors_are_not_retryable() {
        let errors = [
            CommonError::authentication("token expired"),
            CommonError::permission_denied("computers-inventory"),
            CommonError::validation("limit", "must be positive"),
            CommonError::capability_unavailable("execute_policy", "modern backend unavailable"),
            CommonError::circuit_open("modern.search"),
            CommonError::no_suitable_backend("no saved search accessible"),
            CommonError::not_found_with_id("device", "42"),
        ];

        for err in errors {
            assert!(!err.is_retryable(), "{} should not be retryable", err.kind());
        }
    }

    /// Validates `retry_after` is only reported by rate-limited errors.
    ///
    /// Assertions:
    /// - Rate-limited error returns its exact duration.
    /// - Server error returns `None`.
    #[test]
    fn test_retry_after_only_for_rate_limited() {
        let err = CommonError::rate_limited(Duration::from_secs(7));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(CommonError::server(500, "boom").retry_after(), None);
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CommonError::circuit_open("api").to_string(),
            "Circuit breaker is open for 'api', rejecting calls"
        );
        assert_eq!(
            CommonError::no_suitable_backend("none accessible").to_string(),
            "No suitable backend found: none accessible"
        );
        assert_eq!(
            CommonError::config_field("max_retries", "not a number").to_string(),
            "Configuration error in field 'max_retries': not a number"
        );
        assert_eq!(
            CommonError::not_found_with_id("device", "17").to_string(),
            "device not found: '17'"
        );
    }

    /// Validates severity mapping for representative kinds.
    ///
    /// Assertions:
    /// - NotFound is Info, RateLimited is Warning, Internal is Critical and
    ///   critical.
    #[test]
    fn test_severity_levels() {
        assert_eq!(CommonError::not_found("device").severity(), ErrorSeverity::Info);
        assert_eq!(
            CommonError::rate_limited(Duration::from_secs(1)).severity(),
            ErrorSeverity::Warning
        );
        let internal = CommonError::internal("invariant broken");
        assert_eq!(internal.severity(), ErrorSeverity::Critical);
        assert!(internal.is_critical());
        assert!(ErrorSeverity::Critical > ErrorSeverity::Error);
    }

    #[test]
    fn test_tracing_fields_include_kind_and_payload() {
        let err = CommonError::server(502, "bad gateway");
        let fields = err.as_tracing_fields();
        assert_eq!(fields[0], ("error_kind", "server".to_string()));
        assert!(fields.contains(&("status", "502".to_string())));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: CommonError = parse.unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
