//! Bounded TTL cache for read-heavy inventory lookups.
//!
//! Entries expire a fixed time after insertion; reads never extend an
//! entry's life. When full, the entry inserted earliest is evicted, no
//! matter how recently it was read. The cache is process-local.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

/// Build a cache key from an operation name and its parameters.
///
/// Identical parameters always serialize identically, so identical
/// requests land on the same entry.
pub fn cache_key<P: Serialize + ?Sized>(operation: &str, params: &P) -> String {
    let params = serde_json::to_string(params).unwrap_or_default();
    format!("{}:{}", operation, params)
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

/// A capacity-bounded cache with expiry-on-read.
pub struct QueryCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    ttl: Duration,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Return the cached value, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(error = %e, "Query cache lock poisoned, treating as miss");
                return None;
            }
        };
        let expired = match inner.entries.get(key) {
            None => return None,
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
        };
        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a value, evicting the oldest-inserted entry when full.
    ///
    /// Overwriting an existing key refreshes its value and timestamp but
    /// keeps its place in the eviction order.
    pub fn set(&self, key: &str, value: V) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!("Query cache lock poisoned, dropping write");
            return;
        };
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };
        if inner.entries.contains_key(key) {
            inner.entries.insert(key.to_string(), entry);
            return;
        }
        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
        inner.entries.insert(key.to_string(), entry);
        inner.order.push_back(key.to_string());
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
            inner.order.clear();
        }
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_get_after_set() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        assert!(cache.get("a").is_none());
        cache.set("a", 1);
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn test_capacity_plus_one_evicts_first_inserted() {
        let cache = QueryCache::new(3, Duration::from_secs(60));
        for (i, key) in ["k0", "k1", "k2", "k3"].iter().enumerate() {
            cache.set(key, i);
        }
        assert!(cache.get("k0").is_none());
        assert_eq!(cache.get("k1"), Some(1));
        assert_eq!(cache.get("k2"), Some(2));
        assert_eq!(cache.get("k3"), Some(3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_eviction_ignores_reads() {
        let cache = QueryCache::new(2, Duration::from_secs(60));
        cache.set("old", 1);
        cache.set("new", 2);
        // Reading "old" does not protect it: eviction is by insertion order.
        assert_eq!(cache.get("old"), Some(1));
        cache.set("newest", 3);
        assert!(cache.get("old").is_none());
        assert_eq!(cache.get("new"), Some(2));
    }

    #[test]
    fn test_overwrite_keeps_insertion_position() {
        let cache = QueryCache::new(2, Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        assert_eq!(cache.len(), 2);
        cache.set("c", 3);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_entries_expire_without_sliding_renewal() {
        let cache = QueryCache::new(10, Duration::from_millis(200));
        cache.set("a", 1);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get("a"), Some(1));
        thread::sleep(Duration::from_millis(200));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = cache_key("search:chemicals", &("sodium", 20));
        let b = cache_key("search:chemicals", &("sodium", 20));
        let c = cache_key("search:chemicals", &("ethanol", 20));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, "search:chemicals:[\"sodium\",20]");
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(QueryCache::new(100, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..50 {
                        cache.set(&format!("{}-{}", t, i), i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 100);
    }
}
