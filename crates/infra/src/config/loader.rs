//! Configuration loader
//!
//! Loads application configuration from a file or from environment
//! variables layered over defaults.
//!
//! ## Loading Strategy
//! 1. Explicit path passed by the caller
//! 2. Path named by `MDMLINK_CONFIG_PATH`
//! 3. First probed default path (see [`probe_config_paths`])
//! 4. Environment variables over [`Config::default`]
//!
//! A file, once found, is the whole configuration; the environment is not
//! merged into it. Both JSON and TOML are accepted, chosen by extension.
//!
//! ## Environment Variables
//! - `MAX_RETRIES`, `RETRY_INITIAL_DELAY_MS`, `RETRY_MAX_DELAY_MS`,
//!   `RETRY_BACKOFF_MULTIPLIER`, `DEBUG_MODE`, `MAX_CONCURRENCY`
//! - `MDMLINK_BASE_URL`, `MDMLINK_API_TOKEN`, `MDMLINK_REQUEST_TIMEOUT_MS`
//! - `MDMLINK_LOG_JSON`, `MDMLINK_LOG_FILTER`
//!
//! Unset or empty variables keep the default; unparsable values are errors.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use mdmlink_common::error::{CommonError, CommonResult};
use mdmlink_core::IntoCommonError;
use mdmlink_domain::Config;

/// Variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "MDMLINK_CONFIG_PATH";

const FILE_NAMES: [&str; 4] =
    ["mdmlink.toml", "mdmlink.json", "config/mdmlink.toml", "config/mdmlink.json"];

/// Load configuration with automatic fallback strategy
///
/// Reads a `.env` file first when one is present.
///
/// # Errors
/// Returns `CommonError::Config` if the chosen source is unreadable,
/// malformed or fails validation.
pub fn load() -> CommonResult<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }
    load_with(None)
}

/// Like [`load`] with an optional explicit path and without reading `.env`
pub fn load_with(path: Option<PathBuf>) -> CommonResult<Config> {
    if let Some(path) = path {
        return load_from_file(Some(path));
    }

    if let Some(path) = non_empty(std::env::var(CONFIG_PATH_ENV).ok()) {
        return load_from_file(Some(PathBuf::from(path)));
    }

    if let Some(path) = probe_config_paths() {
        return load_from_file(Some(path));
    }

    let config = load_from_env()?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from the process environment over defaults
///
/// # Errors
/// Returns `CommonError::Config` naming the variable when a value cannot be
/// parsed, or when the resulting configuration is invalid.
pub fn load_from_env() -> CommonResult<Config> {
    apply_env(Config::default(), |key| std::env::var(key).ok())
}

/// Overlay variables read through `lookup` onto `config`, then validate.
pub fn apply_env<F>(mut config: Config, lookup: F) -> CommonResult<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| non_empty(lookup(key));

    if let Some(value) = var("MAX_RETRIES") {
        config.resilience.max_retries = parse_var("MAX_RETRIES", &value)?;
    }
    if let Some(value) = var("RETRY_INITIAL_DELAY_MS") {
        config.resilience.retry_initial_delay_ms = parse_var("RETRY_INITIAL_DELAY_MS", &value)?;
    }
    if let Some(value) = var("RETRY_MAX_DELAY_MS") {
        config.resilience.retry_max_delay_ms = parse_var("RETRY_MAX_DELAY_MS", &value)?;
    }
    if let Some(value) = var("RETRY_BACKOFF_MULTIPLIER") {
        config.resilience.retry_backoff_multiplier =
            parse_var("RETRY_BACKOFF_MULTIPLIER", &value)?;
    }
    if let Some(value) = var("DEBUG_MODE") {
        config.resilience.debug_mode = parse_bool("DEBUG_MODE", &value)?;
    }
    if let Some(value) = var("MAX_CONCURRENCY") {
        config.resilience.max_concurrency = parse_var("MAX_CONCURRENCY", &value)?;
    }
    if let Some(value) = var("MDMLINK_BASE_URL") {
        config.transport.base_url = Some(value);
    }
    if let Some(value) = var("MDMLINK_API_TOKEN") {
        config.transport.api_token = Some(value);
    }
    if let Some(value) = var("MDMLINK_REQUEST_TIMEOUT_MS") {
        config.transport.request_timeout_ms = parse_var("MDMLINK_REQUEST_TIMEOUT_MS", &value)?;
    }
    if let Some(value) = var("MDMLINK_LOG_JSON") {
        config.logging.json = parse_bool("MDMLINK_LOG_JSON", &value)?;
    }
    if let Some(value) = var("MDMLINK_LOG_FILTER") {
        config.logging.filter = Some(value);
    }

    config.validate().map_err(IntoCommonError::into_common)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the default locations.
///
/// # Errors
/// Returns `CommonError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or validation fails
pub fn load_from_file(path: Option<PathBuf>) -> CommonResult<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommonError::config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CommonError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| {
        CommonError::config(format!("Failed to read {}: {e}", config_path.display()))
    })?;

    let config = parse_config(&contents, &config_path)?;
    config.validate().map_err(IntoCommonError::into_common)?;
    Ok(config)
}

/// Parse configuration by file extension (`.json` or `.toml`)
fn parse_config(contents: &str, path: &Path) -> CommonResult<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CommonError::config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CommonError::config(format!("Invalid JSON format: {e}"))),
        _ => Err(CommonError::config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the default configuration locations
///
/// Looks for `mdmlink.{toml,json}` and `config/mdmlink.{toml,json}` in the
/// current working directory, then next to the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }
    probe_in(&roots)
}

fn probe_in(roots: &[PathBuf]) -> Option<PathBuf> {
    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.is_file())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str, value: &str) -> CommonResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| CommonError::config_field(key, format!("'{value}': {e}")))
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(key: &str, value: &str) -> CommonResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CommonError::config_field(key, format!("'{value}' is not a boolean"))),
    }
}
