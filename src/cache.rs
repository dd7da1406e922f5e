//! # TTL Cache
//! Keyed in-memory cache with per-entry time-to-live.
//!
//! Expiry is checked lazily at read time; an expired entry is evicted by the
//! `get` that observes it. There is no background sweep. The cache is an
//! explicit object injected into fetchers, so tests can create, inspect and
//! clear their own instances.
//!
//! Concurrent `get` → miss → `set` sequences may race and trigger duplicate
//! upstream fetches. That is accepted: every cached value comes from an
//! idempotent upstream read.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use metrics::counter;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) < self.ttl
    }
}

/// Thread-safe TTL cache. Cloning shares the underlying map.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return a clone of the value if present and younger than its ttl.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut map = self.lock();
        let valid = match map.get(key) {
            Some(entry) => entry.is_valid(now),
            None => {
                counter!("cache_misses_total").increment(1);
                return None;
            }
        };
        if !valid {
            map.remove(key);
            counter!("cache_misses_total").increment(1);
            return None;
        }
        counter!("cache_hits_total").increment(1);
        map.get(key).map(|e| e.value.clone())
    }

    /// Insert or replace. A zero ttl stores nothing.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
            ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().remove(key).map(|e| e.value)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave an entry half-written.
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_before_ttl_miss_after() {
        let cache = TtlCache::new();
        cache.set("k", 7u32, Duration::from_millis(100));
        assert_eq!(cache.get("k"), Some(7));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(cache.get("k"), None);
        // lazily evicted by the read above
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn expired_entries_linger_until_read() {
        let cache = TtlCache::new();
        cache.set("a", "x".to_string(), Duration::from_millis(10));
        cache.set("b", "y".to_string(), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.get("b").as_deref(), Some("y"));
        assert_eq!(cache.size(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn zero_ttl_is_never_cached() {
        let cache = TtlCache::new();
        cache.set("k", 1u8, Duration::ZERO);
        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn clones_share_state_and_clear_empties() {
        let a = TtlCache::new();
        let b = a.clone();
        a.set("k", 1i32, Duration::from_secs(5));
        assert_eq!(b.get("k"), Some(1));
        b.clear();
        assert!(a.is_empty());
    }

    #[test]
    fn set_replaces_and_refreshes() {
        let cache = TtlCache::new();
        cache.set("k", 1i32, Duration::from_secs(5));
        cache.set("k", 2i32, Duration::from_secs(5));
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.remove("k"), Some(2));
        assert_eq!(cache.size(), 0);
    }
}
