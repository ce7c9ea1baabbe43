//! The on-disk shape of a cached result.

use serde::{Deserialize, Serialize};

/// A cached payload with the time it was written and how long it stays fresh.
///
/// Serialized as `{ "timestamp": <unix ms>, "ttl": <ms>, "results": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    /// Unix epoch milliseconds at write time.
    pub timestamp: i64,
    /// Time-to-live in milliseconds.
    pub ttl: u64,
    pub results: serde_json::Value,
}

impl CachedResult {
    /// Fresh while `now - timestamp < ttl`.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        let age = now_ms.saturating_sub(self.timestamp);
        age >= 0 && (age as u64) < self.ttl
    }
}

/// Counts reported by `cache stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub fresh: usize,
    pub stale: usize,
    /// Documents that could not be parsed as a cached result.
    pub invalid: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_boundary() {
        let entry = CachedResult {
            timestamp: 1_000,
            ttl: 500,
            results: serde_json::Value::Null,
        };
        assert!(entry.is_fresh(1_000));
        assert!(entry.is_fresh(1_499));
        assert!(!entry.is_fresh(1_500));
    }
}
