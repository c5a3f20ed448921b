//! In-process TTL cache for slow-changing configuration.
//!
//! Bounded size with insertion-order eviction: when full, the
//! oldest-inserted key is dropped regardless of how recently it was read.
//! That is deliberately simpler than LRU and is a fit for low-cardinality,
//! short-TTL configuration data only; this is not a general-purpose cache.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    // Keys in insertion order; front is the eviction candidate.
    order: VecDeque<String>,
}

/// Size-bounded, time-expiring key/value store. Values are handed out by
/// copy only, so callers can never mutate cached state in place.
///
/// A single coarse lock guards the whole cache; the write rate here is a
/// handful of settings tables, so contention is not a concern.
pub struct TtlCache<V> {
    max_entries: usize,
    inner: Mutex<CacheInner<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Insert or replace the entry for `key`. Replacing counts as a fresh
    /// insertion for both expiry and eviction order. Always succeeds.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        if inner.entries.contains_key(key) {
            inner.order.retain(|k| k != key);
        } else if inner.entries.len() >= self.max_entries {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }

        inner.order.push_back(key.to_string());
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Return a copy of the value if present and unexpired. An expired entry
    /// is removed on the way out; absence is not an error.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        match inner.entries.get(key) {
            Some(entry) if entry.is_expired() => {}
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        }

        inner.entries.remove(key);
        inner.order.retain(|k| k != key);
        None
    }

    /// Remove an entry if present; idempotent.
    pub fn delete(&self, key: &str) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if inner.entries.remove(key).is_some() {
            inner.order.retain(|k| k != key);
        }
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.clear();
        inner.order.clear();
    }

    /// Evict every expired entry. Run from a periodic background task so
    /// write-once-never-read keys do not accumulate until their next read.
    pub fn cleanup(&self) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.entries.remove(key);
        }
        inner.order.retain(|k| !expired.contains(k));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(60);
    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn set_then_get_returns_value() {
        let cache = TtlCache::new(8);
        cache.set("a", 1, LONG);
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn get_after_ttl_returns_absent_and_evicts() {
        let cache = TtlCache::new(8);
        cache.set("a", 1, SHORT);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let cache = TtlCache::new(8);
        cache.set("a", 1, LONG);
        cache.delete("a");
        cache.delete("a");
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn clear_removes_everything() {
        let cache = TtlCache::new(8);
        cache.set("a", 1, LONG);
        cache.set("b", 2, LONG);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn evicts_oldest_inserted_key_at_capacity() {
        let cache = TtlCache::new(2);
        cache.set("a", 1, LONG);
        cache.set("b", 2, LONG);
        // Reading "a" must not protect it: eviction is insertion-order, not LRU.
        assert_eq!(cache.get("a"), Some(1));
        cache.set("c", 3, LONG);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn replacing_a_key_refreshes_its_insertion_order() {
        let cache = TtlCache::new(2);
        cache.set("a", 1, LONG);
        cache.set("b", 2, LONG);
        cache.set("a", 10, LONG);
        cache.set("c", 3, LONG);
        // "b" is now the oldest insertion and gets evicted, not "a".
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn cleanup_sweeps_expired_entries() {
        let cache = TtlCache::new(8);
        cache.set("a", 1, SHORT);
        cache.set("b", 2, LONG);
        std::thread::sleep(Duration::from_millis(40));
        cache.cleanup();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }
}
