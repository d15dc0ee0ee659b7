//! Configuration loading
//!
//! Builds a validated [`mdmlink_domain::Config`] from files or the
//! environment.

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env, load, load_from_env, load_from_file, load_with, probe_config_paths,
    CONFIG_PATH_ENV,
};
