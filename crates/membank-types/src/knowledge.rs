//! Knowledge graph types: entities and relationships extracted from the memory bank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Types of entities in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// A concept or idea (bold terms, headings).
    Concept,
    /// A technology, library or tool.
    Technology,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Concept => f.write_str("CONCEPT"),
            EntityType::Technology => f.write_str("TECHNOLOGY"),
        }
    }
}

/// An entity in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntity {
    /// Slug of the name. Two names with the same slug share an entity.
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub description: String,
    /// Memory bank file the entity was last extracted from.
    pub source_file: String,
    /// Arbitrary properties.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    /// Total mentions across all extractions.
    #[serde(default)]
    pub mentions: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Types of relationships in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// The two entities were mentioned close to each other.
    CoOccurs,
    /// Entities are related.
    RelatedTo,
    /// Entity depends on another.
    DependsOn,
    /// Entity uses another.
    Uses,
    /// A custom relation type.
    Custom(String),
}

/// A relationship between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRelationship {
    /// `<source>_to_<target>`.
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation: RelationType,
    /// Strength (0.0 - 1.0), grows with every co-occurrence.
    pub strength: f32,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl MemoryRelationship {
    /// The id a relationship between `source` and `target` is stored under.
    pub fn id_for(source: &str, target: &str) -> String {
        format!("{source}_to_{target}")
    }
}

/// The persisted knowledge graph document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub entities: BTreeMap<String, MemoryEntity>,
    #[serde(default)]
    pub relationships: BTreeMap<String, MemoryRelationship>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Summary of a knowledge extraction pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub documents_scanned: usize,
    pub entities_created: usize,
    pub entities_merged: usize,
    pub relationships_created: usize,
    pub relationships_strengthened: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_wire_format() {
        let json = serde_json::to_string(&EntityType::Technology).unwrap();
        assert_eq!(json, "\"TECHNOLOGY\"");
    }

    #[test]
    fn test_relationship_id() {
        assert_eq!(MemoryRelationship::id_for("rust", "tokio"), "rust_to_tokio");
    }
}
