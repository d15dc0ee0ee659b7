//! Domain types and models

pub mod backend;
pub mod device;
pub mod mutation;

pub use backend::{Availability, BackendKind, CapabilitySnapshot, SavedSearch};
pub use device::{Device, DeviceField, DeviceRecord};
pub use mutation::{
    InventoryUpdate, MutationKind, MutationReceipt, PolicyExecution, ScriptDeployment,
};
