//! Pre-task consultation and post-task learning.
//!
//! A consultation gathers everything the memory bank knows about a query:
//! core context, ranked sections, matching patterns, related decisions and
//! knowledge graph entities. The enhanced pipeline runs hybrid search and
//! reranking; if any of it fails the legacy keyword-only pipeline answers
//! instead. `consult` itself never fails.

use crate::bank::{MemoryBank, MemoryDocument};
use crate::bounded_cache::BoundedCache;
use crate::cache::{cache_key, ResultCache};
use crate::knowledge::{search_entities, KnowledgeStore};
use crate::markdown::{append_decision, parse_decision_log, Decision};
use crate::patterns::{Pattern, PatternLibrary, PatternRepository};
use crate::ranking::{rank_above, Scored};
use crate::rerank::CrossEncoderReranker;
use crate::search::{Chunk, HybridSearch};
use crate::similarity::{extract_keywords, similarity};
use crate::store::DocumentStore;
use chrono::{NaiveDate, Utc};
use membank_types::config::{CacheConfig, MemoryConfig, SearchConfig};
use membank_types::error::{MembankError, MembankResult};
use membank_types::knowledge::{EntityType, ExtractionReport};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How many keywords a report lists.
const MAX_KEYWORDS: usize = 8;

/// How many entities a report lists.
const MAX_ENTITIES: usize = 5;

/// Characters of section text kept in a report.
const SNIPPET_CHARS: usize = 240;

/// Result-cache categories written by consultation: hybrid search,
/// reranking and whole reports.
pub const CACHE_CATEGORIES: [&str; 3] = ["hybrid", "rerank", "consultation"];

/// Handles on every consultation cache in `store`.
pub fn result_caches(store: &Arc<dyn DocumentStore>, ttl: Duration) -> Vec<ResultCache> {
    CACHE_CATEGORIES
        .iter()
        .map(|category| ResultCache::new(store.clone(), category, ttl))
        .collect()
}

/// Which pipeline produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationMode {
    Enhanced,
    Legacy,
}

impl std::fmt::Display for ConsultationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsultationMode::Enhanced => f.write_str("enhanced"),
            ConsultationMode::Legacy => f.write_str("legacy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub document: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternHit {
    pub id: String,
    pub name: String,
    pub solution: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionHit {
    pub date: Option<NaiveDate>,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityHit {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub score: f64,
}

/// Everything a consultation found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationReport {
    pub query: String,
    pub keywords: Vec<String>,
    pub mode: ConsultationMode,
    pub documents: Vec<DocumentHit>,
    pub patterns: Vec<PatternHit>,
    pub decisions: Vec<DecisionHit>,
    pub entities: Vec<EntityHit>,
    pub has_core_context: bool,
    pub has_patterns: bool,
    pub has_decisions: bool,
    pub recommendations: Vec<String>,
    pub elapsed_ms: u64,
    /// Served from a cache rather than computed.
    pub cached: bool,
}

fn snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SNIPPET_CHARS {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(SNIPPET_CHARS).collect();
        format!("{cut}...")
    }
}

/// Runs consultations against one memory bank.
pub struct Consultant {
    bank: MemoryBank,
    patterns: PatternRepository,
    knowledge: KnowledgeStore,
    search: HybridSearch,
    reranker: CrossEncoderReranker,
    reports: ResultCache,
    recent: BoundedCache<ConsultationReport>,
    decision_log: PathBuf,
    config: MemoryConfig,
}

impl Consultant {
    /// `store` must be rooted at the memory bank directory so that patterns,
    /// the knowledge graph and caches live under `memory/`.
    pub fn new(
        bank: MemoryBank,
        store: Arc<dyn DocumentStore>,
        memory: &MemoryConfig,
        search: &SearchConfig,
        cache: &CacheConfig,
    ) -> Self {
        let ttl = Duration::from_secs(cache.ttl_secs);
        let latency_target = Duration::from_millis(memory.latency_target_ms);
        let decision_log = bank.root().join(&memory.decision_log);
        Self {
            patterns: PatternRepository::new(store.clone(), &memory.pattern_library),
            knowledge: KnowledgeStore::new(store.clone()),
            search: HybridSearch::new(search.clone(), latency_target)
                .with_cache(ResultCache::new(store.clone(), CACHE_CATEGORIES[0], ttl)),
            reranker: CrossEncoderReranker::new(search.window, search.rerank_weight, latency_target)
                .with_cache(ResultCache::new(store.clone(), CACHE_CATEGORIES[1], ttl)),
            reports: ResultCache::new(store, CACHE_CATEGORIES[2], ttl),
            recent: BoundedCache::new(ttl, cache.memory_capacity),
            decision_log,
            bank,
            config: memory.clone(),
        }
    }

    pub fn bank(&self) -> &MemoryBank {
        &self.bank
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    pub fn pattern_library(&self) -> MembankResult<PatternLibrary> {
        self.patterns.load()
    }

    /// Consult the memory bank. Never fails; see [`ConsultationReport::mode`].
    pub fn consult(&self, query: &str) -> ConsultationReport {
        let start = Instant::now();
        let docs = self.bank.load_all_documents();
        let key = cache_key(query, &self.fingerprint(&docs));

        if let Some(mut report) = self.recent.get(&key) {
            debug!(query, "Consultation served from memory");
            report.cached = true;
            return report;
        }
        if let Some(mut report) = self.reports.get::<ConsultationReport>(&key) {
            debug!(query, "Consultation served from file cache");
            report.cached = true;
            self.recent.put(key, report.clone());
            return report;
        }

        let mut report = match self.enhanced(query, &docs) {
            Ok(report) => report,
            Err(e) => {
                warn!(query, error = %e, "Enhanced consultation failed, falling back to legacy");
                self.legacy(query)
            }
        };
        report.elapsed_ms = start.elapsed().as_millis() as u64;
        if report.elapsed_ms > self.config.latency_target_ms {
            warn!(
                elapsed_ms = report.elapsed_ms,
                target_ms = self.config.latency_target_ms,
                "Consultation exceeded latency target"
            );
        }
        info!(
            query,
            mode = %report.mode,
            documents = report.documents.len(),
            patterns = report.patterns.len(),
            decisions = report.decisions.len(),
            elapsed_ms = report.elapsed_ms,
            "Consultation complete"
        );

        if let Err(e) = self.reports.put(&key, &report) {
            warn!(error = %e, "Failed to cache consultation report");
        }
        self.recent.put(key, report.clone());
        report
    }

    /// Hybrid search plus rerank over the whole bank, without the report wrapper.
    pub fn search(&self, query: &str) -> MembankResult<Vec<Scored<Chunk>>> {
        let docs = self.bank.load_all_documents();
        let hits = self.search.search(query, &docs)?;
        let mut reranked = self.reranker.rerank(query, hits)?;
        reranked.truncate(self.config.max_results);
        Ok(reranked)
    }

    /// Corpus revision, pattern library contents and knowledge graph stamp.
    /// A change to any of them misses every cached report.
    fn fingerprint(&self, docs: &[MemoryDocument]) -> String {
        let library = self
            .patterns
            .load()
            .ok()
            .and_then(|l| serde_json::to_string(&l).ok())
            .unwrap_or_default();
        let graph_stamp = self
            .knowledge
            .load()
            .ok()
            .and_then(|g| g.updated_at)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        cache_key(
            &library,
            &format!("{}:{}", MemoryBank::revision(docs), graph_stamp),
        )
    }

    fn enhanced(&self, query: &str, docs: &[MemoryDocument]) -> MembankResult<ConsultationReport> {
        let threshold = self.config.relevance_threshold;
        let has_core_context = !self.bank.load_core_documents().is_empty();

        let hits = self.search.search(query, docs)?;
        let mut hits = self.reranker.rerank(query, hits)?;
        hits.truncate(self.config.max_results);
        let documents = hits
            .into_iter()
            .map(|hit| DocumentHit {
                snippet: snippet(&hit.item.text),
                document: hit.item.document,
                title: hit.item.title,
                score: hit.score,
            })
            .collect();

        let patterns = self.matching_patterns(&self.patterns.load()?, query);
        let decisions = self.related_decisions(&self.read_decisions()?, query);

        let graph = self.knowledge.load()?;
        let entities = search_entities(&graph, query, threshold)
            .into_iter()
            .take(MAX_ENTITIES)
            .map(|s| EntityHit {
                id: s.item.id,
                name: s.item.name,
                entity_type: s.item.entity_type,
                score: s.score,
            })
            .collect();

        let mut report = ConsultationReport {
            query: query.to_string(),
            keywords: extract_keywords(query, MAX_KEYWORDS),
            mode: ConsultationMode::Enhanced,
            documents,
            has_core_context,
            has_patterns: !patterns.is_empty(),
            has_decisions: !decisions.is_empty(),
            patterns,
            decisions,
            entities,
            recommendations: Vec::new(),
            elapsed_ms: 0,
            cached: false,
        };
        report.recommendations = recommendations(&report);
        Ok(report)
    }

    /// Core files plus keyword similarity. Every read failure becomes an empty result.
    fn legacy(&self, query: &str) -> ConsultationReport {
        let threshold = self.config.relevance_threshold;
        let core = self.bank.load_core_documents();
        let mut documents: Vec<DocumentHit> = rank_above(
            core.iter()
                .map(|doc| Scored::new(doc, similarity(query, &doc.content))),
            threshold,
        )
        .into_iter()
        .map(|s| DocumentHit {
            document: s.item.name.clone(),
            title: String::new(),
            snippet: snippet(&s.item.content),
            score: s.score,
        })
        .collect();
        documents.truncate(self.config.max_results);

        let patterns = match self.patterns.load() {
            Ok(library) => self.matching_patterns(&library, query),
            Err(e) => {
                warn!(error = %e, "Pattern library unreadable");
                Vec::new()
            }
        };
        let decisions = match self.read_decisions() {
            Ok(decisions) => self.related_decisions(&decisions, query),
            Err(e) => {
                warn!(error = %e, "Decision log unreadable");
                Vec::new()
            }
        };

        let mut report = ConsultationReport {
            query: query.to_string(),
            keywords: extract_keywords(query, MAX_KEYWORDS),
            mode: ConsultationMode::Legacy,
            documents,
            has_core_context: !core.is_empty(),
            has_patterns: !patterns.is_empty(),
            has_decisions: !decisions.is_empty(),
            patterns,
            decisions,
            entities: Vec::new(),
            recommendations: Vec::new(),
            elapsed_ms: 0,
            cached: false,
        };
        report.recommendations = recommendations(&report);
        report
    }

    fn matching_patterns(&self, library: &PatternLibrary, query: &str) -> Vec<PatternHit> {
        library
            .match_patterns(query, self.config.relevance_threshold)
            .into_iter()
            .take(self.config.max_results)
            .map(|s| PatternHit {
                id: s.item.id,
                name: s.item.name,
                solution: s.item.solution,
                score: s.score,
            })
            .collect()
    }

    fn related_decisions(&self, decisions: &[Decision], query: &str) -> Vec<DecisionHit> {
        rank_above(
            decisions
                .iter()
                .map(|d| Scored::new(d, similarity(query, &d.text()))),
            self.config.relevance_threshold,
        )
        .into_iter()
        .take(self.config.max_results)
        .map(|s| DecisionHit {
            date: s.item.date,
            title: s.item.title.clone(),
            score: s.score,
        })
        .collect()
    }

    /// Parse the decision log. A missing log has no decisions.
    pub fn read_decisions(&self) -> MembankResult<Vec<Decision>> {
        match std::fs::read_to_string(&self.decision_log) {
            Ok(text) => Ok(parse_decision_log(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a dated entry to the decision log.
    pub fn record_decision(&self, title: &str, body: &str) -> MembankResult<()> {
        if title.trim().is_empty() {
            return Err(MembankError::InvalidInput(
                "decision title must not be empty".to_string(),
            ));
        }
        append_decision(&self.decision_log, title, body, Utc::now().date_naive())?;
        self.recent.clear();
        info!(title, "Decision recorded");
        Ok(())
    }

    /// Add or replace a pattern in the library.
    pub fn learn_pattern(&self, pattern: Pattern) -> MembankResult<()> {
        if pattern.id.trim().is_empty() || pattern.name.trim().is_empty() {
            return Err(MembankError::InvalidInput(
                "pattern id and name must not be empty".to_string(),
            ));
        }
        let mut library = self.patterns.load()?;
        let id = pattern.id.clone();
        library.upsert(pattern);
        self.patterns.save(&library)?;
        self.recent.clear();
        info!(pattern = %id, "Pattern learned");
        Ok(())
    }

    /// Count one use of a pattern and its outcome.
    pub fn record_pattern_usage(&self, id: &str, success: bool) -> MembankResult<()> {
        let mut library = self.patterns.load()?;
        library.record_usage(id, success, Utc::now())?;
        self.patterns.save(&library)?;
        self.recent.clear();
        Ok(())
    }

    /// Re-extract the knowledge graph from every document in the bank.
    pub fn refresh_knowledge(&self) -> MembankResult<ExtractionReport> {
        let docs = self.bank.load_all_documents();
        let report = self
            .knowledge
            .refresh(&docs, self.config.cooccurrence_window)?;
        self.recent.clear();
        Ok(report)
    }
}

fn recommendations(report: &ConsultationReport) -> Vec<String> {
    let mut recs = Vec::new();
    if !report.has_core_context {
        recs.push(
            "No core context files found; add memory/core/projectbrief.md to give consultations a baseline"
                .to_string(),
        );
    }
    if let Some(pattern) = report.patterns.first() {
        if pattern.solution.is_empty() {
            recs.push(format!("Consider pattern '{}'", pattern.name));
        } else {
            recs.push(format!("Apply pattern '{}': {}", pattern.name, pattern.solution));
        }
    }
    for decision in report.decisions.iter().take(2) {
        recs.push(format!("Review prior decision '{}'", decision.title));
    }
    if !report.entities.is_empty() {
        let names: Vec<&str> = report.entities.iter().map(|e| e.name.as_str()).collect();
        recs.push(format!("Related concepts: {}", names.join(", ")));
    }
    if report.documents.is_empty() && report.patterns.is_empty() {
        recs.push(
            "Nothing related in memory yet; record the outcome with a decision once the task is done"
                .to_string(),
        );
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonDirStore;
    use std::fs;

    fn setup() -> (tempfile::TempDir, Consultant) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("memory");
        fs::create_dir_all(root.join("core")).unwrap();
        fs::write(
            root.join("core/systemPatterns.md"),
            "## Caching\nQuery results are cached with a soft expiry window.\n",
        )
        .unwrap();
        let memory = MemoryConfig::default();
        let bank = MemoryBank::new(&root, memory.core_files.clone());
        let store: Arc<dyn DocumentStore> = Arc::new(JsonDirStore::new(&root));
        let consultant = Consultant::new(
            bank,
            store,
            &memory,
            &SearchConfig::default(),
            &CacheConfig::default(),
        );
        (dir, consultant)
    }

    #[test]
    fn test_enhanced_consultation() {
        let (_dir, consultant) = setup();
        let report = consultant.consult("cached query results");
        assert_eq!(report.mode, ConsultationMode::Enhanced);
        assert!(report.has_core_context);
        assert_eq!(report.documents[0].title, "Caching");
        assert!(!report.cached);
    }

    #[test]
    fn test_second_consultation_is_cached() {
        let (_dir, consultant) = setup();
        consultant.consult("cached query results");
        let again = consultant.consult("cached query results");
        assert!(again.cached);
    }

    #[test]
    fn test_unsearchable_query_falls_back_to_legacy() {
        let (_dir, consultant) = setup();
        let report = consultant.consult("the and");
        assert_eq!(report.mode, ConsultationMode::Legacy);
        assert!(report.documents.is_empty());
    }

    #[test]
    fn test_decision_and_pattern_feed_consultation() {
        let (_dir, consultant) = setup();
        consultant
            .record_decision("Expire cached results", "Soft expiry keeps stale entries on disk.")
            .unwrap();
        let mut pattern = Pattern::new("soft-ttl", "Soft expiry cache");
        pattern.keywords = vec!["cached".to_string(), "results".to_string()];
        pattern.solution = "Treat stale entries as misses".to_string();
        consultant.learn_pattern(pattern).unwrap();

        let report = consultant.consult("cached results expiry");
        assert!(report.has_decisions);
        assert!(report.has_patterns);
        assert_eq!(report.patterns[0].id, "soft-ttl");
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("Treat stale entries as misses")));
    }

    #[test]
    fn test_empty_decision_title_rejected() {
        let (_dir, consultant) = setup();
        assert!(consultant.record_decision("  ", "body").is_err());
    }
}
