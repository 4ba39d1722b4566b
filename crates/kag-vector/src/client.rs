use tracing::{debug, error};

use kag_core::traits::VectorIndex;
use kag_core::types::{RawCandidate, SourceKind};
use kag_core::{Error, Result};

/// Vector stream of the hybrid search. Sits on the critical path, so
/// every failure is returned to the caller.
pub struct VectorIndexClient<V: VectorIndex> {
    index: V,
}

impl<V: VectorIndex> VectorIndexClient<V> {
    pub fn new(index: V) -> Self {
        Self { index }
    }

    pub fn backend(&self) -> &V {
        &self.index
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    /// Nearest neighbours of `embedding`, most similar first.
    pub async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<RawCandidate>> {
        let expected = self.index.dim();
        if embedding.len() != expected {
            return Err(Error::DimensionMismatch { expected, actual: embedding.len() });
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(Error::Upstream("query embedding contains non-finite values".to_string()));
        }
        if embedding.iter().all(|x| *x == 0.0) {
            return Err(Error::Upstream("query embedding is all zeros, cosine similarity is undefined".to_string()));
        }
        let mut hits = self.index.search_vec(embedding, limit).await.map_err(|e| {
            error!(error = %e, "vector search failed");
            Error::upstream(e)
        })?;
        for h in &mut hits { h.source = SourceKind::Vector; }
        hits.truncate(limit);
        debug!(hits = hits.len(), "vector search");
        Ok(hits)
    }
}
