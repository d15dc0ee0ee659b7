//! # mdmlink Domain
//!
//! Business domain types for the device-management client.
//!
//! This crate contains:
//! - Configuration structures with defaults
//! - Device records and cross-backend field reconciliation
//! - Backend kinds and capability state
//! - Mutation requests and receipts
//!
//! ## Architecture
//! - No dependencies on other mdmlink crates
//! - No I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
