//! Error conversions for infrastructure failures

pub mod conversions;

pub use conversions::{classify_status, InfraError, DEFAULT_RETRY_AFTER};
