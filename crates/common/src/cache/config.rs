//! Bounded cache configuration
//!
//! A cache is sized by `max_size` and optionally ages entries out after
//! `max_age`. Both are fixed for the lifetime of the cache.

use std::time::Duration;

use crate::resilience::{ConfigError, ConfigResult};

/// Configuration for [`BoundedCache`](super::BoundedCache)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedCacheConfig {
    /// Maximum number of entries held at once
    pub max_size: usize,

    /// Age after which an entry is treated as absent (None = no expiration)
    pub max_age: Option<Duration>,
}

impl Default for BoundedCacheConfig {
    fn default() -> Self {
        Self { max_size: 100, max_age: None }
    }
}

impl BoundedCacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> BoundedCacheConfigBuilder {
        BoundedCacheConfigBuilder::default()
    }

    /// Quick preset for a size-bounded LRU cache
    ///
    /// # Example
    /// ```
    /// use mdmlink_common::cache::BoundedCacheConfig;
    ///
    /// let config = BoundedCacheConfig::lru(1000);
    /// assert!(config.max_age.is_none());
    /// ```
    pub fn lru(max_size: usize) -> Self {
        Self { max_size, max_age: None }
    }

    /// Combined TTL + LRU cache
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    ///
    /// use mdmlink_common::cache::BoundedCacheConfig;
    ///
    /// let config = BoundedCacheConfig::ttl_lru(Duration::from_secs(300), 16);
    /// assert_eq!(config.max_size, 16);
    /// ```
    pub fn ttl_lru(max_age: Duration, max_size: usize) -> Self {
        Self { max_size, max_age: Some(max_age) }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_size == 0 {
            return Err(ConfigError::Invalid {
                message: "max_size must be greater than 0".to_string(),
            });
        }
        if self.max_age == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid {
                message: "max_age must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for BoundedCacheConfig with fluent API
#[derive(Debug, Default)]
pub struct BoundedCacheConfigBuilder {
    config: BoundedCacheConfig,
}

impl BoundedCacheConfigBuilder {
    /// Set maximum number of entries
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// Set the age after which entries expire
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = Some(max_age);
        self
    }

    pub fn build(self) -> ConfigResult<BoundedCacheConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
