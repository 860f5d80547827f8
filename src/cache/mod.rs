//! Time-bounded response cache.
//!
//! Entries expire once `now > stored_at + ttl`. Expiry is lazy: an expired
//! entry is dropped when a read finds it, or when the owner calls
//! [`ResponseCache::cleanup`]. The cache never sweeps on its own.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of stored entries, expired-but-unswept ones included.
    pub size: usize,
    /// Lookups that returned a value.
    pub hits: u64,
    /// Lookups that returned nothing.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before the first lookup.
    pub hit_rate: f64,
}

/// Thread-safe key/value cache with per-entry time-to-live.
#[derive(Debug)]
pub struct ResponseCache<V> {
    default_ttl: Duration,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone> ResponseCache<V> {
    /// Creates an empty cache with the given default time-to-live.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Returns the default time-to-live.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the value for `key` if present and unexpired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let now = Instant::now();

        let expired = state.entries.get(key).map(|entry| entry.is_expired(now));
        let fresh = match expired {
            Some(false) => state.entries.get(key).map(|entry| entry.value.clone()),
            Some(true) => {
                state.entries.remove(key);
                tracing::trace!(key, "Cache entry expired");
                None
            }
            None => None,
        };

        if fresh.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        fresh
    }

    /// Stores `value` under `key` with the default time-to-live.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores `value` under `key`, replacing any existing entry.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            ttl,
        };
        self.state.lock().entries.insert(key.into(), entry);
    }

    /// Removes `key`. Returns true if an entry existed.
    pub fn delete(&self, key: &str) -> bool {
        self.state.lock().entries.remove(key).is_some()
    }

    /// Drops every entry and resets the hit/miss counters.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
    }

    /// Removes every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut state = self.state.lock();
        let now = Instant::now();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - state.entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    /// Returns the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let lookups = state.hits + state.misses;
        CacheStats {
            size: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
        }
    }
}
