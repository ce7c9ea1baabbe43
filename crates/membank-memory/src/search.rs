//! Heuristic hybrid search over memory bank sections.
//!
//! Two independent scorers produce a value in `[0, 1]` for a (query, chunk)
//! pair and are merged by a fixed weighted sum. Neither is a real retrieval
//! model: the "semantic" side is a cosine over hash-derived vectors plus
//! token co-occurrence.

use crate::bank::{MemoryBank, MemoryDocument};
use crate::cache::{cache_key, ResultCache};
use crate::embedding::{cosine_similarity, pseudo_embedding};
use crate::markdown::split_sections;
use crate::ranking::{top_n, Scored};
use crate::similarity::{token_set, tokenize};
use membank_types::config::SearchConfig;
use membank_types::error::{MembankError, MembankResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One `##` section of a memory document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document name.
    pub document: String,
    /// Section title, empty for the preamble.
    pub title: String,
    pub text: String,
}

impl Chunk {
    /// Stable identifier of the chunk within a corpus revision.
    pub fn id(&self) -> String {
        format!("{}#{}", self.document, self.title)
    }
}

/// Split every document into section chunks.
pub fn chunk_documents(docs: &[MemoryDocument]) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| {
            split_sections(&doc.content).into_iter().map(move |s| Chunk {
                document: doc.name.clone(),
                text: if s.title.is_empty() {
                    s.body
                } else {
                    format!("{}\n{}", s.title, s.body)
                },
                title: s.title,
            })
        })
        .filter(|c| !c.text.trim().is_empty())
        .collect()
}

/// Scores a chunk's text against a query.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Relevance in `[0, 1]`.
    fn score(&self, query: &str, text: &str) -> f64;
}

/// Fraction of distinct query tokens present in the document tokens.
pub(crate) fn match_ratio(query: &BTreeSet<String>, doc_tokens: &[String]) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let doc: BTreeSet<&str> = doc_tokens.iter().map(String::as_str).collect();
    let hits = query.iter().filter(|t| doc.contains(t.as_str())).count();
    hits as f64 / query.len() as f64
}

/// 1.0 when the first query token appears at the start of the document,
/// falling linearly towards 0 at the end. 0 when nothing matches.
pub(crate) fn position_bonus(query: &BTreeSet<String>, doc_tokens: &[String]) -> f64 {
    if doc_tokens.is_empty() {
        return 0.0;
    }
    match doc_tokens.iter().position(|t| query.contains(t)) {
        Some(first) => 1.0 - first as f64 / doc_tokens.len() as f64,
        None => 0.0,
    }
}

/// Fraction of query token pairs that occur within `window` tokens of each
/// other. A single-token query scores presence.
pub(crate) fn window_cooccurrence(
    query: &BTreeSet<String>,
    doc_tokens: &[String],
    window: usize,
) -> f64 {
    let terms: Vec<&String> = query.iter().collect();
    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, token) in doc_tokens.iter().enumerate() {
        if query.contains(token) {
            positions.entry(token.as_str()).or_default().push(i);
        }
    }

    match terms.len() {
        0 => 0.0,
        1 => {
            if positions.contains_key(terms[0].as_str()) {
                1.0
            } else {
                0.0
            }
        }
        n => {
            let mut pairs = 0usize;
            let mut close = 0usize;
            for i in 0..n {
                for j in i + 1..n {
                    pairs += 1;
                    let (Some(a), Some(b)) = (
                        positions.get(terms[i].as_str()),
                        positions.get(terms[j].as_str()),
                    ) else {
                        continue;
                    };
                    if a.iter().any(|pa| b.iter().any(|pb| pa.abs_diff(*pb) <= window)) {
                        close += 1;
                    }
                }
            }
            close as f64 / pairs as f64
        }
    }
}

/// Exact-token matching with frequency saturation and a position bonus.
#[derive(Debug, Clone, Default)]
pub struct KeywordScorer;

impl Scorer for KeywordScorer {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn score(&self, query: &str, text: &str) -> f64 {
        let query = token_set(query);
        if query.is_empty() {
            return 0.0;
        }
        let doc = tokenize(text);
        let frequency = doc.iter().filter(|t| query.contains(*t)).count() as f64;
        0.6 * match_ratio(&query, &doc)
            + 0.25 * (frequency / (frequency + 2.0))
            + 0.15 * position_bonus(&query, &doc)
    }
}

/// Pseudo-embedding cosine blended with windowed co-occurrence.
#[derive(Debug, Clone)]
pub struct SemanticScorer {
    dims: usize,
    window: usize,
}

impl SemanticScorer {
    pub fn new(dims: usize, window: usize) -> Self {
        Self { dims, window }
    }
}

impl Scorer for SemanticScorer {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn score(&self, query: &str, text: &str) -> f64 {
        let query_tokens = token_set(query);
        if query_tokens.is_empty() {
            return 0.0;
        }
        let cosine = cosine_similarity(
            &pseudo_embedding(query, self.dims),
            &pseudo_embedding(text, self.dims),
        )
        .max(0.0) as f64;
        let doc = tokenize(text);
        0.5 * cosine.min(1.0) + 0.5 * window_cooccurrence(&query_tokens, &doc, self.window)
    }
}

/// Weighted hybrid of the semantic and keyword scorers.
pub struct HybridSearch {
    semantic: Box<dyn Scorer>,
    keyword: Box<dyn Scorer>,
    config: SearchConfig,
    cache: Option<ResultCache>,
    latency_target: Duration,
}

impl HybridSearch {
    /// Weights that do not sum to 1 are rescaled (with a warning).
    pub fn new(mut config: SearchConfig, latency_target: Duration) -> Self {
        let (semantic_weight, keyword_weight) = config.normalized_weights();
        if (semantic_weight - config.semantic_weight).abs() > 1e-9
            || (keyword_weight - config.keyword_weight).abs() > 1e-9
        {
            warn!(
                semantic = config.semantic_weight,
                keyword = config.keyword_weight,
                semantic_weight,
                keyword_weight,
                "Search weights normalized to sum to 1"
            );
            config.semantic_weight = semantic_weight;
            config.keyword_weight = keyword_weight;
        }
        Self {
            semantic: Box::new(SemanticScorer::new(config.embedding_dims, config.window)),
            keyword: Box::new(KeywordScorer),
            config,
            cache: None,
            latency_target,
        }
    }

    /// Cache results (category `hybrid`).
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Score one chunk: `semantic_weight * semantic + keyword_weight * keyword`.
    pub fn score(&self, query: &str, text: &str) -> f64 {
        self.config.semantic_weight * self.semantic.score(query, text)
            + self.config.keyword_weight * self.keyword.score(query, text)
    }

    fn fingerprint(&self, docs: &[MemoryDocument]) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            MemoryBank::revision(docs),
            self.config.semantic_weight,
            self.config.keyword_weight,
            self.config.embedding_dims,
            self.config.window,
            self.config.top_k
        )
    }

    /// Rank the sections of `docs` against `query`.
    ///
    /// Fails with `InvalidInput` when the query has no usable tokens.
    pub fn search(&self, query: &str, docs: &[MemoryDocument]) -> MembankResult<Vec<Scored<Chunk>>> {
        if token_set(query).is_empty() {
            return Err(MembankError::InvalidInput(format!(
                "query '{query}' has no searchable terms"
            )));
        }

        let key = cache_key(query, &self.fingerprint(docs));
        if let Some(cache) = &self.cache {
            if let Some(hits) = cache.get::<Vec<Scored<Chunk>>>(&key) {
                return Ok(hits);
            }
        }

        let start = Instant::now();
        let chunks = chunk_documents(docs);
        let hits = top_n(
            chunks.into_iter().map(|chunk| {
                let score = self.score(query, &chunk.text);
                Scored::new(chunk, score)
            }),
            self.config.min_score,
            self.config.top_k,
        );
        let elapsed = start.elapsed();
        debug!(
            hits = hits.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Hybrid search complete"
        );
        if elapsed > self.latency_target {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                target_ms = self.latency_target.as_millis() as u64,
                "Hybrid search exceeded latency target"
            );
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, &hits) {
                warn!(error = %e, "Failed to cache hybrid search results");
            }
        }
        Ok(hits)
    }
}
