//! Process lifecycle management
//!
//! - **[`manager`]**: explicit [`LifecycleController`] owning managers and
//!   cleanup callbacks, torn down in reverse registration order

pub mod manager;

pub use manager::{
    BoxedError, LifecycleController, ManagerLifecycle, ManagerStatus, ShutdownReport,
};
