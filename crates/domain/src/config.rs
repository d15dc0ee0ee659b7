//! Configuration structures
//!
//! Every section deserializes with `#[serde(default)]`, so a file or
//! environment only has to name the values it overrides. Loading lives in
//! `mdmlink-infra`; this module only defines shapes, defaults and
//! validation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{DomainError, Result};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resilience: ResilienceSettings,
    pub breaker: BreakerSettings,
    pub backend: BackendSettings,
    pub transport: TransportSettings,
    pub logging: LoggingSettings,
}

impl Config {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.resilience.validate()?;
        self.breaker.validate()?;
        self.backend.validate()?;
        self.transport.validate()
    }
}

/// Retry and fan-out settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_backoff_multiplier: f64,
    pub debug_mode: bool,
    pub max_concurrency: usize,
}

impl ResilienceSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(DomainError::config("max_concurrency", "must be greater than 0"));
        }
        if !self.retry_backoff_multiplier.is_finite() || self.retry_backoff_multiplier < 1.0 {
            return Err(DomainError::config(
                "retry_backoff_multiplier",
                format!("must be a finite value >= 1, got {}", self.retry_backoff_multiplier),
            ));
        }
        if self.retry_initial_delay_ms > self.retry_max_delay_ms {
            return Err(DomainError::config(
                "retry_initial_delay_ms",
                "must not exceed retry_max_delay_ms",
            ));
        }
        Ok(())
    }
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            retry_backoff_multiplier: DEFAULT_RETRY_BACKOFF_MULTIPLIER,
            debug_mode: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Circuit breaker settings shared by every keyed breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub half_open_requests: u32,
}

impl BreakerSettings {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(DomainError::config("failure_threshold", "must be greater than 0"));
        }
        if self.half_open_requests == 0 {
            return Err(DomainError::config("half_open_requests", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
            half_open_requests: DEFAULT_HALF_OPEN_REQUESTS,
        }
    }
}

/// Backend detection and fallback dataset settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// How long a fetched saved-search dataset stays fresh
    pub dataset_ttl_secs: u64,
    pub dataset_cache_capacity: usize,
    /// Upper bound on saved searches scanned when no name matches a keyword
    pub max_saved_search_candidates: usize,
    pub default_search_limit: usize,
    /// Preferred saved-search name keywords, highest priority first
    pub saved_search_keywords: Vec<String>,
}

impl BackendSettings {
    pub fn dataset_ttl(&self) -> Duration {
        Duration::from_secs(self.dataset_ttl_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.dataset_ttl_secs == 0 {
            return Err(DomainError::config("dataset_ttl_secs", "must be greater than 0"));
        }
        if self.dataset_cache_capacity == 0 {
            return Err(DomainError::config("dataset_cache_capacity", "must be greater than 0"));
        }
        if self.max_saved_search_candidates == 0
            || self.max_saved_search_candidates > MAX_SAVED_SEARCH_CANDIDATES
        {
            return Err(DomainError::config(
                "max_saved_search_candidates",
                format!("must be between 1 and {MAX_SAVED_SEARCH_CANDIDATES}"),
            ));
        }
        if self.default_search_limit == 0 {
            return Err(DomainError::config("default_search_limit", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            dataset_ttl_secs: DEFAULT_DATASET_TTL_SECS,
            dataset_cache_capacity: DEFAULT_DATASET_CACHE_CAPACITY,
            max_saved_search_candidates: MAX_SAVED_SEARCH_CANDIDATES,
            default_search_limit: DEFAULT_SEARCH_LIMIT,
            saved_search_keywords: SAVED_SEARCH_KEYWORDS.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

/// HTTP transport settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Server root, e.g. `https://tenant.example.com`
    pub base_url: Option<String>,
    /// Bearer token; acquiring and refreshing it is the caller's concern
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub request_timeout_ms: u64,
    pub user_agent: String,
    pub endpoints: EndpointPaths,
}

impl TransportSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(DomainError::config(
                    "base_url",
                    format!("must be an http(s) URL, got '{base_url}'"),
                ));
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(DomainError::config("request_timeout_ms", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            endpoints: EndpointPaths::default(),
        }
    }
}

impl fmt::Debug for TransportSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSettings")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("user_agent", &self.user_agent)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// Endpoint path templates; `{id}` and `{query}` are substituted per call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub modern_inventory: String,
    pub modern_inventory_detail: String,
    pub classic_computers: String,
    pub classic_computer_detail: String,
    pub classic_computer_match: String,
    pub advanced_searches: String,
    pub advanced_search_detail: String,
    pub policy_execute: String,
    pub script_deploy: String,
    pub inventory_update: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            modern_inventory: "/api/v1/computers-inventory".to_string(),
            modern_inventory_detail: "/api/v1/computers-inventory-detail/{id}".to_string(),
            classic_computers: "/JSSResource/computers".to_string(),
            classic_computer_detail: "/JSSResource/computers/id/{id}".to_string(),
            classic_computer_match: "/JSSResource/computers/match/{query}".to_string(),
            advanced_searches: "/JSSResource/advancedcomputersearches".to_string(),
            advanced_search_detail: "/JSSResource/advancedcomputersearches/id/{id}".to_string(),
            policy_execute: "/api/v1/policies/{id}/execute".to_string(),
            script_deploy: "/api/v1/scripts/{id}/deploy".to_string(),
            inventory_update: "/api/v1/computers-inventory/{id}/update-inventory".to_string(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Explicit filter directive; `RUST_LOG` still wins when set
    pub filter: Option<String>,
}
