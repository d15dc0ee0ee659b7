//! # mdmlink Core
//!
//! Backend orchestration for the device-management client.
//!
//! This crate contains:
//! - Port interfaces (traits) for the inventory, saved-search and
//!   management API surfaces
//! - The resilience stack every backend call runs through
//! - [`BackendSelector`], which detects the usable backend and presents a
//!   uniform device contract over it
//!
//! ## Architecture Principles
//! - Depends only on `mdmlink-common` and `mdmlink-domain`
//! - No HTTP or file I/O; adapters live in `mdmlink-infra`
//! - All external calls go through the port traits

pub mod backend;
pub mod errors;

pub use backend::{
    BackendPorts, BackendSelector, InventoryBackend, ManagementBackend, ResilienceStack,
    SavedSearchBackend,
};
pub use errors::IntoCommonError;
