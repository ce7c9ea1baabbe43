//! In-process TTL cache with a fixed capacity.
//!
//! Thread-safe via `DashMap`. Lazy eviction on `get()`: expired entries are
//! only dropped when accessed. When an insert would exceed the capacity, the
//! oldest-inserted key is evicted. A zero TTL or zero capacity disables the
//! cache entirely.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    /// Insertion sequence number; the smallest is the oldest.
    seq: u64,
}

/// Thread-safe bounded cache with configurable TTL.
pub struct BoundedCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    capacity: usize,
    next_seq: AtomicU64,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity,
            next_seq: AtomicU64::new(0),
        }
    }

    fn disabled(&self) -> bool {
        self.ttl.is_zero() || self.capacity == 0
    }

    /// Get a cached value by key. Returns `None` if missing or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        if self.disabled() {
            return None;
        }
        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            drop(entry); // release read lock before removing
            self.entries.remove(key);
            None
        } else {
            Some(entry.value.clone())
        }
    }

    /// Store a value, evicting the oldest-inserted entry if the cache is full.
    pub fn put(&self, key: String, value: V) {
        if self.disabled() {
            return;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        // Re-inserting an existing key does not grow the cache.
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.capacity {
                if !self.evict_oldest() {
                    break;
                }
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                seq,
            },
        );
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().seq)
            .map(|e| e.key().clone());
        match oldest {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Remove all expired entries.
    pub fn evict_expired(&self) {
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries currently in the cache (including possibly expired).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let cache = BoundedCache::new(Duration::from_secs(60), 10);
        cache.put("key1".to_string(), "value1".to_string());
        assert_eq!(cache.get("key1"), Some("value1".to_string()));
    }

    #[test]
    fn test_expired_entry() {
        let cache = BoundedCache::new(Duration::from_millis(1), 10);
        cache.put("key1".to_string(), 1);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("key1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest_inserted() {
        let cache = BoundedCache::new(Duration::from_secs(60), 2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        // Reading "a" does not refresh its position.
        assert_eq!(cache.get("a"), Some(1));
        cache.put("c".to_string(), 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = BoundedCache::new(Duration::from_secs(60), 2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("b".to_string(), 20);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), Some(20));
    }

    #[test]
    fn test_zero_ttl_disables_caching() {
        let cache = BoundedCache::new(Duration::ZERO, 10);
        cache.put("key1".to_string(), 1);
        assert_eq!(cache.get("key1"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_evict_expired() {
        let cache = BoundedCache::new(Duration::from_millis(1), 10);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        std::thread::sleep(Duration::from_millis(10));
        cache.evict_expired();
        assert_eq!(cache.len(), 0);
    }
}
