//! Memory bank substrate.
//!
//! Provides the keyword-overlap relevance scoring and caching layer used by
//! every search-like feature, plus the pipelines built on it:
//! - **Similarity / ranking**: tokenizer, Jaccard similarity, threshold-ranked lists
//! - **Storage**: a narrow document repository over JSON files or SQLite
//! - **Caches**: soft-TTL result cache and a bounded in-process cache
//! - **Consultation**: core files, pattern library, decision log, hybrid search
//! - **Knowledge graph**: regex entity extraction and co-occurrence relationships

pub mod bank;
pub mod bounded_cache;
pub mod cache;
pub mod consolidation;
pub mod consult;
pub mod embedding;
pub mod knowledge;
pub mod markdown;
pub mod migration;
pub mod patterns;
pub mod ranking;
pub mod rerank;
pub mod search;
pub mod similarity;
pub mod sqlite;
pub mod store;

pub use consolidation::{ConsolidationEngine, ConsolidationReport};
pub use consult::{result_caches, ConsultationMode, ConsultationReport, Consultant};
pub use store::{DocumentStore, JsonDirStore};
pub use sqlite::SqliteStore;
