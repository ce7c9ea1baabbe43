//! The hand-maintained pattern library (`learning/patterns.json`).

use crate::ranking::{rank_above, Scored};
use crate::similarity::{jaccard, token_set};
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use membank_types::error::{MembankError, MembankResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// A reusable solution pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub solution: String,
    #[serde(default, alias = "usageCount")]
    pub usage_count: u64,
    /// Fraction of recorded uses that succeeded (0.0 - 1.0).
    #[serde(default, alias = "successRate")]
    pub success_rate: f64,
    #[serde(default, alias = "lastUsed")]
    pub last_used: Option<DateTime<Utc>>,
}

impl Pattern {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            keywords: Vec::new(),
            solution: String::new(),
            usage_count: 0,
            success_rate: 0.0,
            last_used: None,
        }
    }

    /// Token set of everything searchable about the pattern.
    pub fn tokens(&self) -> BTreeSet<String> {
        token_set(&format!(
            "{} {} {} {}",
            self.name,
            self.description,
            self.category,
            self.keywords.join(" ")
        ))
    }
}

/// The library document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternLibrary {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self {
            version: default_version(),
            patterns: Vec::new(),
        }
    }
}

impl PatternLibrary {
    /// Patterns whose Jaccard score against the query reaches `threshold`, best first.
    pub fn match_patterns(&self, query: &str, threshold: f64) -> Vec<Scored<Pattern>> {
        let query_tokens = token_set(query);
        rank_above(
            self.patterns
                .iter()
                .map(|p| Scored::new(p.clone(), jaccard(&query_tokens, &p.tokens()))),
            threshold,
        )
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// Insert a pattern, replacing any existing one with the same id.
    pub fn upsert(&mut self, pattern: Pattern) {
        match self.patterns.iter_mut().find(|p| p.id == pattern.id) {
            Some(existing) => *existing = pattern,
            None => self.patterns.push(pattern),
        }
    }

    /// Count one use of a pattern and fold the outcome into its success rate.
    pub fn record_usage(&mut self, id: &str, success: bool, now: DateTime<Utc>) -> MembankResult<()> {
        let pattern = self
            .patterns
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| MembankError::NotFound(format!("pattern '{id}'")))?;
        let outcome = if success { 1.0 } else { 0.0 };
        let previous = pattern.usage_count as f64;
        pattern.success_rate = (pattern.success_rate * previous + outcome) / (previous + 1.0);
        pattern.usage_count += 1;
        pattern.last_used = Some(now);
        Ok(())
    }

    /// Most used patterns first.
    pub fn top_patterns(&self, n: usize) -> Vec<Scored<Pattern>> {
        crate::ranking::top_n(
            self.patterns
                .iter()
                .map(|p| Scored::new(p.clone(), p.usage_count as f64)),
            0.0,
            n,
        )
    }
}

/// Loads and saves the library through a [`DocumentStore`].
#[derive(Clone)]
pub struct PatternRepository {
    store: Arc<dyn DocumentStore>,
    collection: String,
    key: String,
}

impl PatternRepository {
    /// `relative_path` like `learning/patterns.json` maps to collection
    /// `learning`, key `patterns`.
    pub fn new(store: Arc<dyn DocumentStore>, relative_path: &Path) -> Self {
        let collection = relative_path
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let key = relative_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "patterns".to_string());
        Self {
            store,
            collection,
            key,
        }
    }

    /// Load the library. A missing document is an empty library.
    pub fn load(&self) -> MembankResult<PatternLibrary> {
        match self.store.get(&self.collection, &self.key)? {
            Some(doc) => Ok(serde_json::from_value(doc)?),
            None => Ok(PatternLibrary::default()),
        }
    }

    pub fn save(&self, library: &PatternLibrary) -> MembankResult<()> {
        self.store
            .put(&self.collection, &self.key, &serde_json::to_value(library)?)
    }
}
