use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DocumentChunk, Entity, EntityId, RawCandidate, Relationship};

/// Maps text to fixed-length dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Full-text backend. `search_expr` takes an already-built weighted
/// boolean/proximity expression.
pub trait TextIndex: Send + Sync {
    fn index(&self, chunks: &[DocumentChunk]) -> anyhow::Result<()>;
    fn search_expr(&self, expression: &str, limit: usize) -> anyhow::Result<Vec<RawCandidate>>;
}

/// Nearest-neighbour backend. Results are ordered by similarity, descending.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    async fn index(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> anyhow::Result<()>;
    async fn search_vec(&self, query_vec: &[f32], limit: usize) -> anyhow::Result<Vec<RawCandidate>>;
}

/// Read-only view of the entity/relationship graph.
pub trait GraphStore: Send + Sync {
    /// Entities whose name equals one of `names`, compared case-insensitively.
    fn find_entities_by_names(&self, names: &[String], limit: usize) -> Result<Vec<Entity>>;
    /// Edges with either endpoint in `entity_ids`.
    fn relationships_for(&self, entity_ids: &[EntityId], limit: usize) -> Result<Vec<Relationship>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: Option<u32>,
    pub temperature: f32,
}

/// A chat-completion style language model used for query expansion and
/// answer generation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model(&self) -> &str;
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts).await }
}

impl<T: TextIndex + ?Sized> TextIndex for Arc<T> {
    fn index(&self, chunks: &[DocumentChunk]) -> anyhow::Result<()> { (**self).index(chunks) }
    fn search_expr(&self, expression: &str, limit: usize) -> anyhow::Result<Vec<RawCandidate>> { (**self).search_expr(expression, limit) }
}

#[async_trait]
impl<T: VectorIndex + ?Sized> VectorIndex for Arc<T> {
    fn dim(&self) -> usize { (**self).dim() }
    async fn index(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> anyhow::Result<()> { (**self).index(chunks, embeddings).await }
    async fn search_vec(&self, query_vec: &[f32], limit: usize) -> anyhow::Result<Vec<RawCandidate>> { (**self).search_vec(query_vec, limit).await }
}

impl<T: GraphStore + ?Sized> GraphStore for Arc<T> {
    fn find_entities_by_names(&self, names: &[String], limit: usize) -> Result<Vec<Entity>> { (**self).find_entities_by_names(names, limit) }
    fn relationships_for(&self, entity_ids: &[EntityId], limit: usize) -> Result<Vec<Relationship>> { (**self).relationships_for(entity_ids, limit) }
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    fn model(&self) -> &str { (**self).model() }
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String> { (**self).complete(request).await }
}
