//! Second-stage reranking of hybrid search hits.
//!
//! The "cross-encoder" scores query and chunk jointly from phrase matching,
//! token proximity, position and relative length. Its score is blended with
//! the first-stage score and the list re-sorted.

use crate::cache::{cache_key, ResultCache};
use crate::ranking::{resort, Scored};
use crate::search::{match_ratio, position_bonus, window_cooccurrence, Chunk, Scorer};
use crate::similarity::{normalize, token_set, tokenize};
use membank_types::error::MembankResult;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Expected document length per query token.
const LENGTH_FACTOR: usize = 8;

/// Heuristic joint scorer for (query, chunk) pairs.
#[derive(Debug, Clone)]
pub struct CrossEncoderScorer {
    window: usize,
}

impl CrossEncoderScorer {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Scorer for CrossEncoderScorer {
    fn name(&self) -> &'static str {
        "cross-encoder"
    }

    fn score(&self, query: &str, text: &str) -> f64 {
        let query_tokens = token_set(query);
        if query_tokens.is_empty() {
            return 0.0;
        }
        let doc = tokenize(text);

        // The whole query as a phrase beats scattered terms.
        let phrase = normalize(query);
        let exact = if query_tokens.len() > 1 && normalize(text).contains(&phrase) {
            1.0
        } else {
            match_ratio(&query_tokens, &doc)
        };

        let query_len = tokenize(query).len() * LENGTH_FACTOR;
        let longest = query_len.max(doc.len());
        let length_ratio = if longest == 0 {
            0.0
        } else {
            query_len.min(doc.len()) as f64 / longest as f64
        };

        0.4 * exact
            + 0.3 * window_cooccurrence(&query_tokens, &doc, self.window)
            + 0.15 * position_bonus(&query_tokens, &doc)
            + 0.15 * length_ratio
    }
}

/// Blends the cross-encoder score into first-stage hits.
pub struct CrossEncoderReranker {
    scorer: CrossEncoderScorer,
    /// Weight of the cross-encoder score; the first-stage score gets the rest.
    weight: f64,
    cache: Option<ResultCache>,
    latency_target: Duration,
}

impl CrossEncoderReranker {
    pub fn new(window: usize, weight: f64, latency_target: Duration) -> Self {
        Self {
            scorer: CrossEncoderScorer::new(window),
            weight: weight.clamp(0.0, 1.0),
            cache: None,
            latency_target,
        }
    }

    /// Cache results (category `rerank`).
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Rescore and re-sort `hits`. An empty list is returned unchanged.
    pub fn rerank(
        &self,
        query: &str,
        hits: Vec<Scored<Chunk>>,
    ) -> MembankResult<Vec<Scored<Chunk>>> {
        if hits.is_empty() {
            return Ok(hits);
        }

        let fingerprint = format!(
            "{}:{}",
            self.weight,
            hits.iter()
                .map(|h| format!("{}={:.6}", h.item.id(), h.score))
                .collect::<Vec<_>>()
                .join(",")
        );
        let key = cache_key(query, &fingerprint);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get::<Vec<Scored<Chunk>>>(&key) {
                return Ok(cached);
            }
        }

        let start = Instant::now();
        let mut reranked: Vec<Scored<Chunk>> = hits
            .into_iter()
            .map(|hit| {
                let rerank = self.scorer.score(query, &hit.item.text);
                let score = self.weight * rerank + (1.0 - self.weight) * hit.score;
                Scored::new(hit.item, score)
            })
            .collect();
        resort(&mut reranked);

        let elapsed = start.elapsed();
        debug!(
            scorer = self.scorer.name(),
            hits = reranked.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Rerank complete"
        );
        if elapsed > self.latency_target {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                target_ms = self.latency_target.as_millis() as u64,
                "Rerank exceeded latency target"
            );
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, &reranked) {
                warn!(error = %e, "Failed to cache rerank results");
            }
        }
        Ok(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(title: &str, text: &str) -> Chunk {
        Chunk {
            document: "core/notes.md".to_string(),
            title: title.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_phrase_match_scores_highest() {
        let scorer = CrossEncoderScorer::new(5);
        let phrase = scorer.score("connection pooling", "Connection pooling keeps sockets warm");
        let scattered = scorer.score(
            "connection pooling",
            "Pooling threads is cheap, every connection is not",
        );
        assert!(phrase > scattered);
        assert!(phrase <= 1.0);
    }

    #[test]
    fn test_no_overlap_scores_only_length() {
        let scorer = CrossEncoderScorer::new(5);
        let score = scorer.score("connection pooling", "Unrelated words about gardening");
        assert!(score <= 0.15 + 1e-9);
    }

    #[test]
    fn test_rerank_reorders() {
        let reranker = CrossEncoderReranker::new(5, 1.0, Duration::from_secs(5));
        let hits = vec![
            Scored::new(chunk("A", "gardening notes about tomatoes"), 0.9),
            Scored::new(chunk("B", "connection pooling for postgres"), 0.1),
        ];
        let reranked = reranker.rerank("connection pooling", hits).unwrap();
        assert_eq!(reranked[0].item.title, "B");
    }

    #[test]
    fn test_zero_weight_keeps_first_stage() {
        let reranker = CrossEncoderReranker::new(5, 0.0, Duration::from_secs(5));
        let hits = vec![
            Scored::new(chunk("A", "gardening notes"), 0.9),
            Scored::new(chunk("B", "connection pooling"), 0.1),
        ];
        let reranked = reranker.rerank("connection pooling", hits).unwrap();
        assert_eq!(reranked[0].item.title, "A");
        assert!((reranked[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_empty_hits() {
        let reranker = CrossEncoderReranker::new(5, 0.6, Duration::from_secs(5));
        assert!(reranker.rerank("anything", Vec::new()).unwrap().is_empty());
    }
}
