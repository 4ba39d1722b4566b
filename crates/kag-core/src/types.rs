//! Domain types shared by the retrieval pipeline.
//!
//! Everything here is created fresh per query and dropped once the
//! `SearchResponse` is returned.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type DocId = i64;
pub type EntityId = i64;

/// Inclusive bounds for the caller-requested result count.
pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 20;

/// A search request as received from the caller. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    text: String,
    top_k: usize,
    debug: bool,
}

impl Query {
    pub fn new(text: impl Into<String>, top_k: usize, debug: bool) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::InvalidQuery("query text is empty".to_string()));
        }
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&top_k) {
            return Err(Error::InvalidQuery(format!(
                "top_k must be within {MIN_TOP_K}..={MAX_TOP_K}, got {top_k}"
            )));
        }
        Ok(Self { text, top_k, debug })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceKind {
    Vector,
    Text,
}

/// One hit as returned by a single index, before normalization.
///
/// `raw_score` is engine-specific but higher is always better. `doc_id`
/// may appear in both streams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawCandidate {
    pub source: SourceKind,
    pub doc_id: DocId,
    pub content: String,
    pub raw_score: f32,
}

impl RawCandidate {
    pub fn vector(doc_id: DocId, content: impl Into<String>, raw_score: f32) -> Self {
        Self { source: SourceKind::Vector, doc_id, content: content.into(), raw_score }
    }

    pub fn text(doc_id: DocId, content: impl Into<String>, raw_score: f32) -> Self {
        Self { source: SourceKind::Text, doc_id, content: content.into(), raw_score }
    }
}

/// A candidate after per-batch normalization and weighted combination.
///
/// `combined_score = w * vector_score + (1 - w) * text_score`; a stream the
/// document was absent from contributes 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedCandidate {
    pub doc_id: DocId,
    pub content: String,
    pub vector_score: f32,
    pub text_score: f32,
    pub combined_score: f32,
}

/// A graph entity. Identity is `(id, name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for Entity {}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
    }
}

impl Entity {
    /// Merge two records of the same entity, keeping the richer description
    /// and the union of aliases.
    pub fn merge_with(&self, other: &Entity) -> Result<Entity> {
        if self != other {
            return Err(Error::Operation(format!(
                "cannot merge entity {}:{} with {}:{}",
                self.id, self.name, other.id, other.name
            )));
        }
        let description = match (&self.description, &other.description) {
            (Some(a), Some(b)) => Some(if b.len() > a.len() { b.clone() } else { a.clone() }),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        let mut aliases = self.aliases.clone();
        for alias in &other.aliases {
            if !aliases.contains(alias) {
                aliases.push(alias.clone());
            }
        }
        Ok(Entity {
            id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            description,
            aliases,
        })
    }
}

/// A directed edge between two entities. Parallel edges with different
/// `relation_type` are distinct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub source_entity_id: EntityId,
    pub target_entity_id: EntityId,
    pub relation_type: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
}

/// The unit returned to the caller: one merged candidate plus its graph links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub candidate: MergedCandidate,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub generated_response: Option<String>,
    /// Wall time of the whole pipeline in seconds.
    pub execution_time: f64,
}

/// A chunk of a source document that is independently indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub doc_id: DocId,
    pub source_path: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}
