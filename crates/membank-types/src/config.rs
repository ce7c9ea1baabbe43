//! Configuration structs loaded from `membank.toml`.
//!
//! Every field has a default so a partial (or missing) file still yields a
//! complete configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which backend holds JSON documents (caches, pattern library, knowledge graph).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One JSON file per document under the memory directory.
    #[default]
    Files,
    /// A single SQLite database at `<memory dir>/membank.db`.
    Sqlite,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MembankConfig {
    /// Workspace root override. `None` means "locate from the current directory".
    pub root: Option<PathBuf>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Document storage backend.
    pub storage: StorageBackend,
    pub memory: MemoryConfig,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub tasks: TaskConfig,
    pub feedback: FeedbackConfig,
    pub monitoring: MonitoringConfig,
    pub improvement: ImprovementConfig,
    pub api: ApiConfig,
}

impl Default for MembankConfig {
    fn default() -> Self {
        Self {
            root: None,
            log_level: "info".to_string(),
            storage: StorageBackend::default(),
            memory: MemoryConfig::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
            tasks: TaskConfig::default(),
            feedback: FeedbackConfig::default(),
            monitoring: MonitoringConfig::default(),
            improvement: ImprovementConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// Memory bank layout and consultation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Memory bank directory, relative to the workspace root.
    pub dir: PathBuf,
    /// Core markdown files read from `<dir>/core/` during consultation.
    pub core_files: Vec<String>,
    /// Pattern library document, relative to `dir`.
    pub pattern_library: PathBuf,
    /// Decision log, relative to `dir`.
    pub decision_log: PathBuf,
    /// Minimum Jaccard score for a pattern or decision to count as relevant.
    pub relevance_threshold: f64,
    /// Maximum items per report section.
    pub max_results: usize,
    /// Character distance within which two entities are considered co-occurring.
    pub cooccurrence_window: usize,
    /// Soft latency target for a consultation; overruns are logged only.
    pub latency_target_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("memory"),
            core_files: [
                "projectbrief.md",
                "productContext.md",
                "activeContext.md",
                "systemPatterns.md",
                "techContext.md",
                "progress.md",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            pattern_library: PathBuf::from("learning/patterns.json"),
            decision_log: PathBuf::from("core/decisionLog.md"),
            relevance_threshold: 0.1,
            max_results: 10,
            cooccurrence_window: 200,
            latency_target_ms: 500,
        }
    }
}

/// Weights and limits for hybrid search and reranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    /// Length of the hash-derived pseudo-embedding.
    pub embedding_dims: usize,
    /// Sliding window (in tokens) for co-occurrence scoring.
    pub window: usize,
    pub min_score: f64,
    pub top_k: usize,
    /// Weight of the cross-encoder score when blended with the first-stage score.
    pub rerank_weight: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            embedding_dims: 128,
            window: 5,
            min_score: 0.05,
            top_k: 10,
            rerank_weight: 0.6,
        }
    }
}

impl SearchConfig {
    /// `(semantic, keyword)` weights scaled to sum to 1.
    ///
    /// Negative or non-finite weights count as 0; if nothing is left the
    /// defaults apply.
    pub fn normalized_weights(&self) -> (f64, f64) {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let (semantic, keyword) = (clean(self.semantic_weight), clean(self.keyword_weight));
        let total = semantic + keyword;
        if total <= 0.0 {
            let defaults = Self::default();
            return (defaults.semantic_weight, defaults.keyword_weight);
        }
        (semantic / total, keyword / total)
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Capacity of the in-process cache kept in front of the document cache.
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            memory_capacity: 100,
        }
    }
}

/// Task store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub file: PathBuf,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(".taskmaster/tasks/tasks.json"),
        }
    }
}

/// Feedback tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub dir: PathBuf,
    /// Cap on each stored array; the oldest entries are dropped beyond it.
    pub max_entries: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("feedback"),
            max_entries: 1000,
        }
    }
}

/// Performance monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub dir: PathBuf,
    pub max_samples: usize,
    pub max_alerts: usize,
    pub response_time_target_ms: u64,
    /// Error rate (0.0 - 1.0) over the recent window that raises a critical alert.
    pub error_rate_threshold: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("monitoring"),
            max_samples: 1000,
            max_alerts: 200,
            response_time_target_ms: 2000,
            error_rate_threshold: 0.05,
        }
    }
}

/// Improvement review settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImprovementConfig {
    pub dir: PathBuf,
    /// Hour of day (UTC) at which scheduled reviews become due.
    pub review_hour: u32,
    pub max_reviews: usize,
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("improvement"),
            review_hour: 9,
            max_reviews: 100,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen: String,
    /// Signing secret for the mock Stripe webhook. Unset disables verification.
    pub stripe_webhook_secret: Option<String>,
    pub requests_per_minute: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:4300".to_string(),
            stripe_webhook_secret: None,
            requests_per_minute: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: MembankConfig = toml::from_str("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.storage, StorageBackend::Files);
        assert_eq!(config.search.semantic_weight, 0.7);
        assert_eq!(config.memory.core_files.len(), 6);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: MembankConfig = toml::from_str(
            r#"
            storage = "sqlite"
            [cache]
            ttl_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.memory_capacity, 100);
        assert_eq!(config.tasks.file, PathBuf::from(".taskmaster/tasks/tasks.json"));
    }

    #[test]
    fn test_search_weights_normalize() {
        let weights = |semantic, keyword| {
            SearchConfig {
                semantic_weight: semantic,
                keyword_weight: keyword,
                ..Default::default()
            }
            .normalized_weights()
        };
        let (s, k) = weights(0.7, 0.3);
        assert!((s - 0.7).abs() < 1e-9 && (k - 0.3).abs() < 1e-9);
        let (s, k) = weights(2.0, 2.0);
        assert!((s - 0.5).abs() < 1e-9 && (k - 0.5).abs() < 1e-9);
        let (s, k) = weights(-1.0, 3.0);
        assert_eq!((s, k), (0.0, 1.0));
        let (s, k) = weights(0.0, f64::NAN);
        assert!((s - 0.7).abs() < 1e-9 && (k - 0.3).abs() < 1e-9);
    }
}
