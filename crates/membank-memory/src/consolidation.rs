//! Pattern library consolidation.
//!
//! Merges near-duplicate patterns and reports how many cache documents have
//! gone stale. Stale caches are counted, not removed.

use crate::cache::ResultCache;
use crate::patterns::{Pattern, PatternRepository};
use crate::similarity::jaccard;
use membank_types::error::MembankResult;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Result of one consolidation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub patterns_merged: u64,
    pub patterns_remaining: u64,
    pub stale_cache_entries: u64,
    pub duration_ms: u64,
}

/// Pattern consolidation engine.
#[derive(Clone)]
pub struct ConsolidationEngine {
    patterns: PatternRepository,
    caches: Vec<ResultCache>,
    /// Jaccard similarity at or above which two patterns are merged.
    merge_threshold: f64,
}

impl ConsolidationEngine {
    pub fn new(patterns: PatternRepository, caches: Vec<ResultCache>, merge_threshold: f64) -> Self {
        Self {
            patterns,
            caches,
            merge_threshold,
        }
    }

    /// Run a consolidation cycle.
    pub fn consolidate(&self) -> MembankResult<ConsolidationReport> {
        let start = std::time::Instant::now();

        let mut library = self.patterns.load()?;
        let before = library.patterns.len();
        library.patterns = merge_similar(std::mem::take(&mut library.patterns), self.merge_threshold);
        let merged = before - library.patterns.len();
        if merged > 0 {
            self.patterns.save(&library)?;
        }

        let mut stale = 0u64;
        for cache in &self.caches {
            let stats = cache.stats()?;
            stale += (stats.stale + stats.invalid) as u64;
        }

        let report = ConsolidationReport {
            patterns_merged: merged as u64,
            patterns_remaining: library.patterns.len() as u64,
            stale_cache_entries: stale,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            merged = report.patterns_merged,
            remaining = report.patterns_remaining,
            stale_cache_entries = report.stale_cache_entries,
            "Consolidation complete"
        );
        Ok(report)
    }
}

/// Fold `other` into `keep`: union keywords, sum usage, usage-weighted success rate.
fn absorb(keep: &mut Pattern, other: Pattern) {
    let total = keep.usage_count + other.usage_count;
    if total > 0 {
        keep.success_rate = (keep.success_rate * keep.usage_count as f64
            + other.success_rate * other.usage_count as f64)
            / total as f64;
    }
    keep.usage_count = total;
    for keyword in other.keywords {
        if !keep.keywords.contains(&keyword) {
            keep.keywords.push(keyword);
        }
    }
    if keep.solution.is_empty() {
        keep.solution = other.solution;
    }
    keep.last_used = keep.last_used.max(other.last_used);
}

/// Greedy single pass: each pattern merges into the first kept pattern it
/// resembles; the higher-usage side survives.
fn merge_similar(patterns: Vec<Pattern>, threshold: f64) -> Vec<Pattern> {
    let mut kept: Vec<Pattern> = Vec::new();
    for pattern in patterns {
        let tokens = pattern.tokens();
        match kept
            .iter_mut()
            .find(|k| jaccard(&k.tokens(), &tokens) >= threshold)
        {
            Some(existing) => {
                if pattern.usage_count > existing.usage_count {
                    let previous = std::mem::replace(existing, pattern);
                    absorb(existing, previous);
                } else {
                    absorb(existing, pattern);
                }
            }
            None => kept.push(pattern),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, JsonDirStore};
    use crate::patterns::PatternLibrary;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    fn pattern(id: &str, name: &str, usage: u64, rate: f64) -> Pattern {
        let mut p = Pattern::new(id, name);
        p.keywords = vec![id.to_string()];
        p.usage_count = usage;
        p.success_rate = rate;
        p
    }

    fn setup() -> (tempfile::TempDir, Arc<dyn DocumentStore>, PatternRepository) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DocumentStore> = Arc::new(JsonDirStore::new(dir.path()));
        let repo = PatternRepository::new(store.clone(), Path::new("learning/patterns.json"));
        (dir, store, repo)
    }

    #[test]
    fn test_consolidation_empty() {
        let (_dir, _store, repo) = setup();
        let engine = ConsolidationEngine::new(repo, Vec::new(), 0.8);
        let report = engine.consolidate().unwrap();
        assert_eq!(report.patterns_merged, 0);
        assert_eq!(report.patterns_remaining, 0);
    }

    #[test]
    fn test_merges_near_duplicates() {
        let mut a = Pattern::new("retry-a", "Retry network calls with backoff");
        a.usage_count = 1;
        a.success_rate = 1.0;
        a.keywords = vec!["network".to_string()];
        let mut b = Pattern::new("retry-b", "Retry network calls with backoff");
        b.usage_count = 3;
        b.success_rate = 0.0;
        b.keywords = vec!["network".to_string(), "flaky".to_string()];
        let other = pattern("logging", "Structured logging spans", 2, 0.5);

        let merged = merge_similar(vec![a, other, b], 0.8);
        assert_eq!(merged.len(), 2);
        let retry = merged.iter().find(|p| p.name.starts_with("Retry")).unwrap();
        assert_eq!(retry.id, "retry-b");
        assert_eq!(retry.usage_count, 4);
        assert!((retry.success_rate - 0.25).abs() < 1e-9);
        assert!(retry.keywords.contains(&"flaky".to_string()));
    }

    #[test]
    fn test_consolidate_saves_and_counts_stale_cache() {
        let (_dir, store, repo) = setup();
        repo.save(&PatternLibrary {
            version: "1.0".to_string(),
            patterns: vec![
                pattern("caching", "Cache query results", 2, 1.0),
                pattern("caching", "Cache query results", 1, 1.0),
            ],
        })
        .unwrap();
        let cache = ResultCache::new(store, "hybrid", Duration::from_secs(60));
        cache.put_at("old", &serde_json::json!([]), 0).unwrap();
        cache.put("fresh", &serde_json::json!([])).unwrap();

        let engine = ConsolidationEngine::new(repo.clone(), vec![cache], 0.8);
        let report = engine.consolidate().unwrap();
        assert_eq!(report.patterns_merged, 1);
        assert_eq!(report.patterns_remaining, 1);
        assert_eq!(report.stale_cache_entries, 1);
        assert_eq!(repo.load().unwrap().patterns[0].usage_count, 3);
    }
}
