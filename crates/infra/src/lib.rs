//! # mdmlink Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Configuration loading (environment, TOML and JSON files)
//! - Tracing subscriber setup
//! - HTTP transport with status classification
//! - REST adapters for the device-management server
//! - Runtime bootstrap with lifecycle management
//!
//! ## Architecture
//! - Implements traits defined in `mdmlink-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod config;
pub mod errors;
pub mod http;
pub mod mdm;
pub mod observability;
pub mod runtime;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use mdm::{
    build_ports, ports_from_settings, AdvancedSearchClient, ClassicInventoryClient,
    ManagementClient, ModernInventoryClient,
};
pub use observability::init_tracing;
pub use runtime::MdmRuntime;
