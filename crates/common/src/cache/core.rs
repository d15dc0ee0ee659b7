//! Bounded LRU cache with optional entry expiry
//!
//! Recency is tracked by [`lru::LruCache`]: the most recently used entry is
//! at the head, the eviction candidate at the tail. Capacity is enforced
//! here rather than by the underlying map so that every removal, automatic
//! or explicit, can be reported to the eviction listener.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use super::config::BoundedCacheConfig;
use super::stats::{CacheStats, MetricsCollector};
use crate::resilience::{Clock, ConfigResult, SystemClock};

/// Callback invoked with every entry removed from the cache
pub type EvictionListener<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// A cached value and the instant it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, max_age: Option<Duration>) -> bool {
        max_age.is_some_and(|max_age| now.saturating_duration_since(self.inserted_at) > max_age)
    }
}

/// Thread-safe LRU cache with optional TTL and eviction notification
///
/// Never holds more than `max_size` entries. The eviction listener runs
/// after the internal lock is released, so it may call back into the cache.
///
/// # Type Parameters
/// - `K`: Key type (must be `Eq + Hash + Clone`)
/// - `V`: Value type (must be `Clone` for reads)
/// - `C`: Clock type for age checks (defaults to `SystemClock`)
///
/// # Example
/// ```
/// use mdmlink_common::cache::{BoundedCache, BoundedCacheConfig};
///
/// let cache: BoundedCache<String, i32> = BoundedCache::new(BoundedCacheConfig::lru(2)).unwrap();
/// cache.set("x".to_string(), 1);
/// cache.set("y".to_string(), 2);
/// cache.set("z".to_string(), 3);
///
/// assert!(!cache.has(&"x".to_string()));
/// assert_eq!(cache.get(&"z".to_string()), Some(3));
/// ```
pub struct BoundedCache<K, V, C = SystemClock>
where
    K: Eq + Hash,
    C: Clock,
{
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    config: BoundedCacheConfig,
    on_evict: Option<EvictionListener<K, V>>,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> BoundedCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache with the given configuration using system clock
    pub fn new(config: BoundedCacheConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> BoundedCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(config: BoundedCacheConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            entries: Mutex::new(LruCache::unbounded()),
            config,
            on_evict: None,
            metrics: MetricsCollector::default(),
            clock,
        })
    }

    /// Register the listener notified of every removal
    pub fn on_evict<F>(mut self, listener: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(listener));
        self
    }

    /// Look up `key`, promoting it to most recently used.
    ///
    /// An entry older than `max_age` is removed, reported to the eviction
    /// listener and treated as absent.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let (value, expired) = {
            let mut entries = self.entries.lock();
            let is_expired = entries.peek(key).map(|entry| entry.is_expired(now, self.config.max_age));
            match is_expired {
                Some(false) => (entries.get(key).map(|entry| entry.value.clone()), None),
                Some(true) => (None, entries.pop_entry(key)),
                None => (None, None),
            }
        };

        if let Some((key, entry)) = expired {
            self.metrics.record_expirations(1);
            self.notify(&key, &entry.value);
        }

        if value.is_some() {
            self.metrics.record_hit();
        } else {
            self.metrics.record_miss();
        }
        value
    }

    /// Insert or replace `key` as the most recently used entry.
    ///
    /// A replaced value is dropped silently. Otherwise least recently used
    /// entries are evicted until there is room.
    pub fn set(&self, key: K, value: V) {
        let now = self.clock.now();
        let evicted = {
            let mut entries = self.entries.lock();
            let mut evicted = Vec::new();
            entries.pop(&key);
            while entries.len() >= self.config.max_size {
                match entries.pop_lru() {
                    Some(pair) => evicted.push(pair),
                    None => break,
                }
            }
            entries.put(key, CacheEntry { value, inserted_at: now });
            evicted
        };

        self.metrics.record_evictions(evicted.len());
        for (key, entry) in evicted {
            self.notify(&key, &entry.value);
        }
    }

    /// Whether a live entry exists for `key`, without promoting it
    pub fn has(&self, key: &K) -> bool {
        let now = self.clock.now();
        let expired = {
            let mut entries = self.entries.lock();
            match entries.peek(key).map(|entry| entry.is_expired(now, self.config.max_age)) {
                Some(false) => return true,
                Some(true) => entries.pop_entry(key),
                None => return false,
            }
        };

        if let Some((key, entry)) = expired {
            self.metrics.record_expirations(1);
            self.notify(&key, &entry.value);
        }
        false
    }

    /// Remove `key`, returning whether it was present
    pub fn delete(&self, key: &K) -> bool {
        let removed = self.entries.lock().pop_entry(key);
        match removed {
            Some((key, entry)) => {
                self.notify(&key, &entry.value);
                true
            }
            None => false,
        }
    }

    /// Remove every entry, notifying the listener for each
    pub fn clear(&self) {
        let drained = {
            let mut entries = self.entries.lock();
            let mut drained = Vec::with_capacity(entries.len());
            while let Some(pair) = entries.pop_lru() {
                drained.push(pair);
            }
            drained
        };

        for (key, entry) in drained {
            self.notify(&key, &entry.value);
        }
    }

    /// Sweep out every entry older than `max_age`, returning how many went
    pub fn clean_expired(&self) -> usize {
        let Some(max_age) = self.config.max_age else {
            return 0;
        };

        let now = self.clock.now();
        let removed: Vec<(K, CacheEntry<V>)> = {
            let mut entries = self.entries.lock();
            let stale: Vec<K> = entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now, Some(max_age)))
                .map(|(key, _)| key.clone())
                .collect();
            stale.iter().filter_map(|key| entries.pop_entry(key)).collect()
        };

        self.metrics.record_expirations(removed.len());
        for (key, entry) in &removed {
            self.notify(key, &entry.value);
        }
        removed.len()
    }

    /// Size, capacity, utilization and access counters
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.config.max_size)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn config(&self) -> &BoundedCacheConfig {
        &self.config
    }

    fn notify(&self, key: &K, value: &V) {
        if let Some(listener) = &self.on_evict {
            listener(key, value);
        }
    }
}

impl<K, V, C> fmt::Debug for BoundedCache<K, V, C>
where
    K: Eq + Hash,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("config", &self.config)
            .field("len", &self.entries.lock().len())
            .field("has_listener", &self.on_evict.is_some())
            .finish()
    }
}
