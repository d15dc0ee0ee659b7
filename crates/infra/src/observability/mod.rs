//! Tracing subscriber initialization
//!
//! Structured logs go to stderr through a single `tracing-subscriber` stack.
//!
//! # Filter priority (highest to lowest)
//!
//! 1. `logging.filter` from configuration
//! 2. `RUST_LOG`
//! 3. `debug` when `DEBUG_MODE` is on, `info` otherwise

use mdmlink_common::error::{CommonError, CommonResult};
use mdmlink_domain::Config;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber for `config`.
///
/// Safe to call more than once: returns `Ok(false)` when a subscriber is
/// already installed.
///
/// # Errors
/// Returns `CommonError::Config` when `logging.filter` is not a valid
/// directive string.
pub fn init_tracing(config: &Config) -> CommonResult<bool> {
    let filter = build_env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(true))
            .try_init()
            .is_ok()
    } else {
        let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(use_ansi).with_target(true))
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(json = config.logging.json, "tracing initialized");
    }
    Ok(installed)
}

/// Filter directives per the module-level priority chain
pub fn build_env_filter(config: &Config) -> CommonResult<EnvFilter> {
    if let Some(directives) = &config.logging.filter {
        return EnvFilter::try_new(directives)
            .map_err(|e| CommonError::config_field("logging.filter", e.to_string()));
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    Ok(EnvFilter::new(default_level(config.resilience.debug_mode)))
}

fn default_level(debug_mode: bool) -> &'static str {
    if debug_mode {
        "debug"
    } else {
        "info"
    }
}
