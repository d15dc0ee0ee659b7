//! Error types for domain-level validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures raised by domain types before any I/O happens
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainError {
    #[error("Configuration error in '{field}': {message}")]
    Config { field: String, message: String },

    #[error("Invalid input for '{field}': {message}")]
    InvalidInput { field: String, message: String },
}

impl DomainError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { field: field.into(), message: message.into() }
    }

    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput { field: field.into(), message: message.into() }
    }

    /// Name of the offending field
    pub fn field(&self) -> &str {
        match self {
            Self::Config { field, .. } | Self::InvalidInput { field, .. } => field,
        }
    }
}

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, DomainError>;
