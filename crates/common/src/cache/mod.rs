//! Bounded LRU cache with optional time-to-live
//!
//! [`BoundedCache`] keeps at most `max_size` entries, evicting the least
//! recently used one to make room, and optionally treats entries older than
//! `max_age` as absent. Every removal is reported to an eviction listener.
//!
//! # Examples
//!
//! ## Expiring snapshot cache
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mdmlink_common::cache::{BoundedCache, BoundedCacheConfig};
//!
//! let evicted = Arc::new(AtomicUsize::new(0));
//! let counter = evicted.clone();
//!
//! let cache: BoundedCache<String, Vec<u8>> =
//!     BoundedCache::new(BoundedCacheConfig::ttl_lru(Duration::from_secs(300), 16))
//!         .unwrap()
//!         .on_evict(move |_key, _value| {
//!             counter.fetch_add(1, Ordering::Relaxed);
//!         });
//!
//! cache.set("fleet".to_string(), vec![1, 2, 3]);
//! assert!(cache.delete(&"fleet".to_string()));
//! assert_eq!(evicted.load(Ordering::Relaxed), 1);
//! ```

pub mod config;
pub mod core;
pub mod stats;

pub use config::{BoundedCacheConfig, BoundedCacheConfigBuilder};
pub use core::{BoundedCache, CacheEntry, EvictionListener};
pub use stats::CacheStats;
