//! Backend ports, resilience wiring and the selector that ties them together

pub mod ports;
pub mod selector;
pub mod stack;

pub use ports::{BackendPorts, InventoryBackend, ManagementBackend, SavedSearchBackend};
pub use selector::BackendSelector;
pub use stack::{breaker_config, retry_config, ResilienceStack};
