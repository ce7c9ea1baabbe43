//! Knowledge graph extracted from the memory bank.
//!
//! Entities come from regex matches in markdown (bold terms and `###`
//! headings are concepts, inline code and a fixed vocabulary are
//! technologies). Two entities mentioned within a character window of each
//! other in the same document get a `co_occurs` relationship whose strength
//! grows every time the pair shows up again. Nothing is ever pruned.

use crate::bank::MemoryDocument;
use crate::ranking::{rank_above, top_n, Scored};
use crate::similarity::{jaccard, token_set};
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use membank_types::error::MembankResult;
use membank_types::knowledge::{
    EntityType, ExtractionReport, KnowledgeGraph, MemoryEntity, MemoryRelationship, RelationType,
};
use regex_lite::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::info;

const GRAPH_COLLECTION: &str = "learning";
const GRAPH_KEY: &str = "knowledge-graph";

/// Strength added per co-occurrence.
const STRENGTH_STEP: f32 = 0.1;

/// Longest description kept for an entity.
const MAX_DESCRIPTION_CHARS: usize = 200;

const TECHNOLOGY_VOCABULARY: &str = r"(?i)\b(rust|cargo|tokio|axum|serde|typescript|javascript|node\.?js|deno|react|next\.?js|vue|svelte|python|django|flask|go|java|kotlin|postgres(?:ql)?|mysql|sqlite|redis|mongodb|docker|kubernetes|terraform|graphql|rest|grpc|stripe|playwright|jest|vitest|express|webpack|vite|tailwind|git|github|markdown|json|yaml|toml)\b";

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*\n]{2,60})\*\*").expect("static regex"))
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^###[ \t]+(.+?)[ \t]*$").expect("static regex"))
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([A-Za-z][A-Za-z0-9_.\-]{1,40})`").expect("static regex"))
}

fn vocabulary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TECHNOLOGY_VOCABULARY).expect("static regex"))
}

/// Lowercase, runs of non-alphanumerics become a single `-`, trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// One regex hit inside a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    pub name: String,
    pub entity_type: EntityType,
    /// Byte offset of the match in the document.
    pub offset: usize,
    /// The line the mention sits on, used as the entity description.
    pub context: String,
}

fn line_around(text: &str, offset: usize) -> String {
    let start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = text[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(text.len());
    let line = text[start..end]
        .trim()
        .trim_start_matches(['#', '-', '*', ' '])
        .trim();
    line.chars().take(MAX_DESCRIPTION_CHARS).collect()
}

/// All entity mentions in `text`, ordered by offset.
pub fn extract_mentions(text: &str) -> Vec<Mention> {
    let mut mentions = Vec::new();
    let mut push = |name: &str, entity_type: EntityType, offset: usize| {
        let name = name.trim();
        if name.is_empty() || slugify(name).is_empty() {
            return;
        }
        mentions.push(Mention {
            name: name.to_string(),
            entity_type,
            offset,
            context: line_around(text, offset),
        });
    };

    for caps in bold_re().captures_iter(text) {
        if let Some(m) = caps.get(1) {
            push(m.as_str(), EntityType::Concept, m.start());
        }
    }
    for caps in heading_re().captures_iter(text) {
        if let Some(m) = caps.get(1) {
            push(m.as_str(), EntityType::Concept, m.start());
        }
    }
    for caps in code_re().captures_iter(text) {
        if let Some(m) = caps.get(1) {
            push(m.as_str(), EntityType::Technology, m.start());
        }
    }
    for m in vocabulary_re().find_iter(text) {
        push(m.as_str(), EntityType::Technology, m.start());
    }

    // A vocabulary word at the start of a bold or code span is not a second
    // mention. The first pattern to claim an offset wins.
    mentions.sort_by_key(|m| m.offset);
    mentions.dedup_by(|later, earlier| later.offset == earlier.offset);
    mentions
}

/// Merge one mention into the graph. Returns `true` if the entity was new.
fn merge_entity(
    graph: &mut KnowledgeGraph,
    mention: &Mention,
    source_file: &str,
    now: DateTime<Utc>,
) -> bool {
    let id = slugify(&mention.name);
    let mut properties = HashMap::new();
    properties.insert(
        "last_seen_in".to_string(),
        serde_json::Value::String(source_file.to_string()),
    );

    match graph.entities.get_mut(&id) {
        Some(existing) => {
            // Shallow overwrite with the newest extraction.
            existing.name = mention.name.clone();
            existing.entity_type = mention.entity_type;
            if !mention.context.is_empty() {
                existing.description = mention.context.clone();
            }
            existing.source_file = source_file.to_string();
            existing.properties.extend(properties);
            existing.mentions += 1;
            existing.updated_at = now;
            false
        }
        None => {
            graph.entities.insert(
                id.clone(),
                MemoryEntity {
                    id,
                    name: mention.name.clone(),
                    entity_type: mention.entity_type,
                    description: mention.context.clone(),
                    source_file: source_file.to_string(),
                    properties,
                    mentions: 1,
                    created_at: now,
                    updated_at: now,
                },
            );
            true
        }
    }
}

/// Record one co-occurrence of `a` and `b`. Returns `true` if the relationship was new.
fn link(graph: &mut KnowledgeGraph, a: &str, b: &str, source_file: &str, now: DateTime<Utc>) -> bool {
    let (source, target) = if a <= b { (a, b) } else { (b, a) };
    let id = MemoryRelationship::id_for(source, target);
    match graph.relationships.get_mut(&id) {
        Some(rel) => {
            rel.strength = (rel.strength + STRENGTH_STEP).min(1.0);
            let count = rel
                .properties
                .get("co_occurrences")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            rel.properties
                .insert("co_occurrences".to_string(), serde_json::json!(count + 1));
            rel.properties.insert(
                "last_seen_in".to_string(),
                serde_json::Value::String(source_file.to_string()),
            );
            false
        }
        None => {
            let mut properties = HashMap::new();
            properties.insert("co_occurrences".to_string(), serde_json::json!(1));
            properties.insert(
                "last_seen_in".to_string(),
                serde_json::Value::String(source_file.to_string()),
            );
            graph.relationships.insert(
                id.clone(),
                MemoryRelationship {
                    id,
                    source: source.to_string(),
                    target: target.to_string(),
                    relation: RelationType::CoOccurs,
                    strength: STRENGTH_STEP,
                    properties,
                    created_at: now,
                },
            );
            true
        }
    }
}

/// Extract entities and co-occurrence relationships from `docs` into `graph`.
///
/// Each distinct entity pair is linked at most once per document.
pub fn extract_into(
    graph: &mut KnowledgeGraph,
    docs: &[MemoryDocument],
    window: usize,
    now: DateTime<Utc>,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();
    for doc in docs {
        report.documents_scanned += 1;
        let mentions = extract_mentions(&doc.content);
        for mention in &mentions {
            if merge_entity(graph, mention, &doc.name, now) {
                report.entities_created += 1;
            } else {
                report.entities_merged += 1;
            }
        }

        let ids: Vec<(String, usize)> = mentions
            .iter()
            .map(|m| (slugify(&m.name), m.offset))
            .collect();
        let mut linked: BTreeSet<(String, String)> = BTreeSet::new();
        for (i, (a, offset_a)) in ids.iter().enumerate() {
            for (b, offset_b) in ids[i + 1..].iter() {
                if offset_b - offset_a > window {
                    break;
                }
                if a == b {
                    continue;
                }
                let pair = if a <= b {
                    (a.clone(), b.clone())
                } else {
                    (b.clone(), a.clone())
                };
                if linked.insert(pair.clone()) {
                    if link(graph, &pair.0, &pair.1, &doc.name, now) {
                        report.relationships_created += 1;
                    } else {
                        report.relationships_strengthened += 1;
                    }
                }
            }
        }
    }
    graph.updated_at = Some(now);
    report
}

/// Most mentioned entities first.
pub fn top_entities(graph: &KnowledgeGraph, n: usize) -> Vec<Scored<MemoryEntity>> {
    top_n(
        graph
            .entities
            .values()
            .map(|e| Scored::new(e.clone(), e.mentions as f64)),
        0.0,
        n,
    )
}

/// Relationships touching `id`, strongest first.
pub fn related(graph: &KnowledgeGraph, id: &str) -> Vec<Scored<MemoryRelationship>> {
    rank_above(
        graph
            .relationships
            .values()
            .filter(|r| r.source == id || r.target == id)
            .map(|r| Scored::new(r.clone(), r.strength as f64)),
        0.0,
    )
}

/// Entities whose name and description overlap the query.
pub fn search_entities(
    graph: &KnowledgeGraph,
    query: &str,
    threshold: f64,
) -> Vec<Scored<MemoryEntity>> {
    let query_tokens = token_set(query);
    rank_above(
        graph.entities.values().map(|e| {
            let mut score = jaccard(&query_tokens, &token_set(&format!("{} {}", e.name, e.description)));
            // Exact name hits (including short names the tokenizer drops) count fully.
            if query.to_lowercase().split_whitespace().any(|w| slugify(w) == e.id) {
                score = score.max(1.0);
            }
            Scored::new(e.clone(), score)
        }),
        threshold,
    )
}

/// Persists the knowledge graph as one document.
#[derive(Clone)]
pub struct KnowledgeStore {
    store: Arc<dyn DocumentStore>,
}

impl KnowledgeStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Load the graph. A missing document is an empty graph.
    pub fn load(&self) -> MembankResult<KnowledgeGraph> {
        match self.store.get(GRAPH_COLLECTION, GRAPH_KEY)? {
            Some(doc) => Ok(serde_json::from_value(doc)?),
            None => Ok(KnowledgeGraph::default()),
        }
    }

    pub fn save(&self, graph: &KnowledgeGraph) -> MembankResult<()> {
        self.store
            .put(GRAPH_COLLECTION, GRAPH_KEY, &serde_json::to_value(graph)?)
    }

    /// Load, extract from `docs`, save.
    pub fn refresh(&self, docs: &[MemoryDocument], window: usize) -> MembankResult<ExtractionReport> {
        let mut graph = self.load()?;
        let report = extract_into(&mut graph, docs, window, Utc::now());
        self.save(&graph)?;
        info!(
            documents = report.documents_scanned,
            entities = graph.entities.len(),
            relationships = graph.relationships.len(),
            "Knowledge graph refreshed"
        );
        Ok(report)
    }
}
