//! Conversions from domain validation errors into the shared error taxonomy.

use mdmlink_common::error::CommonError;
use mdmlink_domain::DomainError;

/// Extension trait lifting domain errors into [`CommonError`].
///
/// The orphan rule keeps a `From` impl out of this crate, so callers use
/// `.map_err(IntoCommonError::into_common)`.
pub trait IntoCommonError {
    fn into_common(self) -> CommonError;
}

impl IntoCommonError for DomainError {
    fn into_common(self) -> CommonError {
        match self {
            DomainError::Config { field, message } => CommonError::config_field(field, message),
            DomainError::InvalidInput { field, message } => CommonError::validation(field, message),
        }
    }
}
