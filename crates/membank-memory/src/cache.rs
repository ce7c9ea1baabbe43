//! Soft-TTL result cache over a [`DocumentStore`].
//!
//! Each category (`hybrid`, `rerank`, `consultation`, ...) is its own
//! collection under `cache/`. A document is fresh while
//! `now - timestamp < ttl`. Stale documents are treated as misses and left in
//! place; only [`ResultCache::prune_expired`] removes them.

use crate::similarity::normalize;
use crate::store::DocumentStore;
use chrono::Utc;
use membank_types::cache::{CacheStats, CachedResult};
use membank_types::error::MembankResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache key for a query: hex SHA-256 of the normalized query and a fingerprint
/// of whatever else the result depends on (corpus revision, weights, ...).
pub fn cache_key(query: &str, fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(query).as_bytes());
    hasher.update(b"|");
    hasher.update(fingerprint.as_bytes());
    hex::encode(hasher.finalize())
}

/// A TTL cache for one category of results.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn DocumentStore>,
    collection: String,
    ttl: Duration,
}

impl ResultCache {
    /// Create a cache for `category`, stored in collection `cache/<category>`.
    pub fn new(store: Arc<dyn DocumentStore>, category: &str, ttl: Duration) -> Self {
        Self {
            store,
            collection: format!("cache/{category}"),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Fetch the raw cached entry if it is still fresh at `now_ms`.
    pub fn get_entry_at(&self, key: &str, now_ms: i64) -> Option<CachedResult> {
        let doc = match self.store.get(&self.collection, key) {
            Ok(Some(doc)) => doc,
            Ok(None) => return None,
            Err(e) => {
                warn!(collection = %self.collection, key, error = %e, "Cache read failed");
                return None;
            }
        };
        let entry: CachedResult = match serde_json::from_value(doc) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(collection = %self.collection, key, error = %e, "Ignoring malformed cache entry");
                return None;
            }
        };
        if entry.is_fresh(now_ms) {
            debug!(collection = %self.collection, key, "Cache hit");
            Some(entry)
        } else {
            debug!(collection = %self.collection, key, "Cache entry stale");
            None
        }
    }

    /// Typed fetch at `now_ms`.
    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now_ms: i64) -> Option<T> {
        let entry = self.get_entry_at(key, now_ms)?;
        match serde_json::from_value(entry.results) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(collection = %self.collection, key, error = %e, "Cached payload has unexpected shape");
                None
            }
        }
    }

    /// Typed fetch at the current time.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now().timestamp_millis())
    }

    /// Store `value` with timestamp `now_ms`, overwriting any previous entry.
    pub fn put_at<T: Serialize>(&self, key: &str, value: &T, now_ms: i64) -> MembankResult<()> {
        let entry = CachedResult {
            timestamp: now_ms,
            ttl: self.ttl.as_millis() as u64,
            results: serde_json::to_value(value)?,
        };
        self.store
            .put(&self.collection, key, &serde_json::to_value(&entry)?)
    }

    /// Store `value` stamped with the current time.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> MembankResult<()> {
        self.put_at(key, value, Utc::now().timestamp_millis())
    }

    /// Count fresh, stale and unparsable documents at `now_ms`.
    pub fn stats_at(&self, now_ms: i64) -> MembankResult<CacheStats> {
        let mut stats = CacheStats::default();
        for (_, doc) in self.store.list(&self.collection)? {
            match serde_json::from_value::<CachedResult>(doc) {
                Ok(entry) if entry.is_fresh(now_ms) => stats.fresh += 1,
                Ok(_) => stats.stale += 1,
                Err(_) => stats.invalid += 1,
            }
        }
        Ok(stats)
    }

    pub fn stats(&self) -> MembankResult<CacheStats> {
        self.stats_at(Utc::now().timestamp_millis())
    }

    /// Delete stale and unparsable documents. Returns how many were removed.
    pub fn prune_expired_at(&self, now_ms: i64) -> MembankResult<usize> {
        let mut removed = 0;
        for (key, doc) in self.store.list(&self.collection)? {
            let keep = serde_json::from_value::<CachedResult>(doc)
                .map(|entry| entry.is_fresh(now_ms))
                .unwrap_or(false);
            if !keep && self.store.delete(&self.collection, &key)? {
                removed += 1;
            }
        }
        debug!(collection = %self.collection, removed, "Pruned expired cache entries");
        Ok(removed)
    }

    pub fn prune_expired(&self) -> MembankResult<usize> {
        self.prune_expired_at(Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonDirStore;
    use serde_json::json;

    fn setup(ttl_ms: u64) -> (tempfile::TempDir, ResultCache) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(JsonDirStore::new(dir.path()));
        let cache = ResultCache::new(store, "hybrid", Duration::from_millis(ttl_ms));
        (dir, cache)
    }

    #[test]
    fn test_cache_key_normalizes_query() {
        assert_eq!(cache_key("Rust  Cache", "v1"), cache_key("rust cache", "v1"));
        assert_ne!(cache_key("rust cache", "v1"), cache_key("rust cache", "v2"));
        assert_eq!(cache_key("x", "").len(), 64);
    }

    #[test]
    fn test_fresh_entry_returned_unchanged() {
        let (_dir, cache) = setup(1_000);
        let payload = json!({"hits": [1, 2, 3]});
        cache.put_at("k", &payload, 10_000).unwrap();
        let got: serde_json::Value = cache.get_at("k", 10_999).unwrap();
        assert_eq!(got, payload);
    }

    #[test]
    fn test_stale_entry_is_miss_but_stays_on_disk() {
        let (dir, cache) = setup(1_000);
        cache.put_at("k", &json!("v"), 10_000).unwrap();
        assert!(cache.get_at::<serde_json::Value>("k", 11_000).is_none());
        assert!(dir.path().join("cache").join("hybrid").join("k.json").exists());
    }

    #[test]
    fn test_document_shape() {
        let (dir, cache) = setup(60_000);
        cache.put_at("k", &json!([1]), 5).unwrap();
        let raw = std::fs::read_to_string(dir.path().join("cache/hybrid/k.json")).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc, json!({"timestamp": 5, "ttl": 60000, "results": [1]}));
    }

    #[test]
    fn test_stats_and_prune() {
        let (_dir, cache) = setup(1_000);
        cache.put_at("old", &json!(1), 0).unwrap();
        cache.put_at("new", &json!(2), 5_000).unwrap();
        let stats = cache.stats_at(5_500).unwrap();
        assert_eq!(stats, CacheStats { fresh: 1, stale: 1, invalid: 0 });
        assert_eq!(cache.prune_expired_at(5_500).unwrap(), 1);
        assert!(cache.get_at::<serde_json::Value>("new", 5_500).is_some());
    }

    #[test]
    fn test_wrong_payload_shape_is_miss() {
        let (_dir, cache) = setup(1_000);
        cache.put_at("k", &json!("text"), 0).unwrap();
        assert!(cache.get_at::<Vec<u32>>("k", 1).is_none());
    }
}
