//! In-Memory TTL Cache
//!
//! Thread-safe expiring key-value store shared by every fetcher.
//! DashMap gives concurrent access without a global lock; every `set`
//! fully replaces the prior entry so there is no read-modify-write race.
//!
//! - Entries with a zero TTL never expire
//! - Expired entries are evicted lazily on read (no background thread)
//! - Values are returned by clone, never by reference
//! - No size bound: callers pick short TTLs for high-cardinality keyspaces

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache entry with its absolute expiry (`None` = never expires)
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };
        Self { value, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() > deadline)
            .unwrap_or(false)
    }
}

/// Generic TTL cache. Cloning shares the underlying store.
#[derive(Clone)]
pub struct TtlCache<V: Clone> {
    store: Arc<DashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache whose `set` uses `default_ttl` (zero = no expiry)
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            default_ttl,
        }
    }

    pub fn with_ttl_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Returns a copy of the value, or None if absent or expired.
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.store.get(key) {
            if entry.is_expired() {
                drop(entry); // release the shard read lock before removing
                self.store.remove(key);
                debug!("📭 CACHE MISS (expired): {}", key);
                None
            } else {
                debug!("✅ CACHE HIT: {}", key);
                Some(entry.value.clone())
            }
        } else {
            debug!("📭 CACHE MISS: {}", key);
            None
        }
    }

    /// Store with the cache's default TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store with an explicit TTL (zero = no expiry)
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        debug!("💾 CACHE SET: {} (TTL: {}ms)", key, ttl.as_millis());
        self.store.insert(key, CacheEntry::new(value, ttl));
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Build a namespaced key such as `trace:ethereum:0xabc:25`
pub fn namespaced_key(namespace: &str, parts: &[&str]) -> String {
    let mut key = String::from(namespace);
    for part in parts {
        key.push(':');
        key.push_str(part);
    }
    key
}
