//! Application constants
//!
//! Centralized defaults for configuration and backend selection.

// Retry defaults (overridable through MAX_RETRIES and friends)
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

// Circuit breaker defaults
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_HALF_OPEN_REQUESTS: u32 = 3;

// Backend selection
pub const DEFAULT_DATASET_TTL_SECS: u64 = 300;
pub const DEFAULT_DATASET_CACHE_CAPACITY: usize = 16;
pub const MAX_SAVED_SEARCH_CANDIDATES: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const SAVED_SEARCH_KEYWORDS: [&str; 4] = ["all", "inventory", "compliance", "applications"];

// Transport
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_USER_AGENT: &str = concat!("mdmlink/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_RATE_LIMIT_RETRY_AFTER_SECS: u64 = 1;
