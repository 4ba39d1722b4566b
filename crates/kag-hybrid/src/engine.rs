use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use kag_core::config::Settings;
use kag_core::traits::{Embedder, GraphStore, LanguageModel, TextIndex, VectorIndex};
use kag_core::types::{DocumentChunk, MergedCandidate, Query, RawCandidate, SearchResponse, SearchResult};
use kag_core::{Error, Result};
use kag_graph::{EntityLinker, RelationshipResolver};
use kag_llm::AnswerGenerator;
use kag_text::TextIndexClient;
use kag_vector::VectorIndexClient;

use crate::context::ContextAssembler;
use crate::debug::DebugSink;
use crate::merge::ResultMerger;
use crate::normalize::QueryNormalizer;

/// Backends the engine is assembled from.
pub struct EngineComponents {
    pub embedder: Arc<dyn Embedder>,
    pub vector_index: Arc<dyn VectorIndex>,
    pub text_index: Arc<dyn TextIndex>,
    pub graph: Arc<dyn GraphStore>,
    /// Answer generation model; `None` disables generation.
    pub llm: Option<Arc<dyn LanguageModel>>,
    /// Query expansion model, used only when `expansion.enabled`.
    pub expansion_llm: Option<Arc<dyn LanguageModel>>,
}

#[derive(Serialize)]
struct StreamSnapshot<'a> {
    vector: &'a [RawCandidate],
    text: &'a [RawCandidate],
    merged: &'a [MergedCandidate],
}

pub struct HybridSearchEngine {
    embedder: Arc<dyn Embedder>,
    normalizer: QueryNormalizer,
    vector: VectorIndexClient<Arc<dyn VectorIndex>>,
    text: Arc<TextIndexClient<Arc<dyn TextIndex>>>,
    merger: ResultMerger,
    linker: Arc<EntityLinker<Arc<dyn GraphStore>>>,
    resolver: Arc<RelationshipResolver<Arc<dyn GraphStore>>>,
    assembler: ContextAssembler,
    generator: Option<AnswerGenerator<Arc<dyn LanguageModel>>>,
    debug_sink: DebugSink,
    vector_weight: f32,
    candidate_limit: usize,
}

impl HybridSearchEngine {
    pub fn new(settings: &Settings, components: EngineComponents) -> Result<Self> {
        let EngineComponents { embedder, vector_index, text_index, graph, llm, expansion_llm } = components;
        if embedder.dim() != vector_index.dim() {
            return Err(Error::DimensionMismatch { expected: vector_index.dim(), actual: embedder.dim() });
        }
        let normalizer = match expansion_llm {
            Some(model) if settings.expansion.enabled => QueryNormalizer::with_expansion(model),
            _ => QueryNormalizer::new(),
        };
        let generator = match llm {
            Some(model) if settings.generation.enabled => Some(AnswerGenerator::new(model, &settings.generation, &settings.llm)),
            _ => None,
        };
        let vector_weight = settings.search.vector_weight.clamp(0.0, 1.0);
        if vector_weight != settings.search.vector_weight {
            warn!(configured = settings.search.vector_weight, used = vector_weight, "vector_weight clamped to [0, 1]");
        }
        info!(
            dim = embedder.dim(),
            vector_weight,
            expansion = normalizer.expands(),
            generation = generator.is_some(),
            "hybrid search engine ready"
        );
        Ok(Self {
            embedder,
            normalizer,
            vector: VectorIndexClient::new(vector_index),
            text: Arc::new(TextIndexClient::new(text_index, &settings.search)),
            merger: ResultMerger::from_settings(&settings.search),
            linker: Arc::new(EntityLinker::new(Arc::clone(&graph), &settings.linking)),
            resolver: Arc::new(RelationshipResolver::new(graph, &settings.linking)),
            assembler: ContextAssembler::new(&settings.context),
            generator,
            debug_sink: DebugSink::new(settings.storage.debug_path()),
            vector_weight,
            candidate_limit: settings.search.candidate_limit,
        })
    }

    /// Embed `chunks` and write them to both indexes.
    pub async fn index(&self, chunks: &[DocumentChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.map_err(Error::upstream)?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Upstream(format!("{} embeddings for {} chunks", embeddings.len(), chunks.len())));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.vector.dim()) {
            return Err(Error::DimensionMismatch { expected: self.vector.dim(), actual: bad.len() });
        }
        self.vector.backend().index(chunks, &embeddings).await.map_err(Error::upstream)?;
        self.text.backend().index(chunks).map_err(|e| Error::Operation(format!("text indexing failed: {e}")))?;
        info!(chunks = chunks.len(), "indexed chunks");
        Ok(())
    }

    pub async fn query(&self, query: &Query) -> Result<SearchResponse> {
        let start = Instant::now();
        let normalized = self.normalizer.normalize(query.text()).await;
        info!(raw = query.text(), %normalized, top_k = query.top_k(), "query");
        if query.debug() {
            self.debug_sink.write("normalized", &serde_json::json!({ "raw": query.text(), "normalized": normalized.as_str() }));
        }
        if normalized.is_empty() {
            info!(raw = query.text(), "query has no searchable characters, returning no results");
            return Ok(SearchResponse {
                query: query.text().to_string(),
                results: vec![],
                generated_response: None,
                execution_time: start.elapsed().as_secs_f64(),
            });
        }

        let embedding = self.embedder.embed_one(&normalized).await.map_err(|e| {
            warn!(error = %e, "query embedding failed");
            Error::upstream(e)
        })?;

        let limit = self.candidate_limit;
        let text_client = Arc::clone(&self.text);
        let text_query = normalized.clone();
        let text_task = tokio::task::spawn_blocking(move || text_client.search(&text_query, limit));
        let (vector_hits, text_hits) = tokio::join!(self.vector.search(&embedding, limit), text_task);
        let vector_hits = vector_hits?;
        let text_hits = text_hits.unwrap_or_else(|e| {
            warn!(error = %e, "text search task failed, continuing with vector results only");
            vec![]
        });
        debug!(vector = vector_hits.len(), text = text_hits.len(), "retrieved candidates");

        let merged = self.merger.merge(&vector_hits, &text_hits, self.vector_weight, query.top_k());
        if query.debug() {
            self.debug_sink.write("search_results", &StreamSnapshot { vector: &vector_hits, text: &text_hits, merged: &merged });
        }

        let linker = Arc::clone(&self.linker);
        let resolver = Arc::clone(&self.resolver);
        let results = tokio::task::spawn_blocking(move || link_results(&linker, &resolver, merged))
            .await
            .map_err(|e| Error::Operation(format!("graph linking task failed: {e}")))?;

        let context = self.assembler.assemble(query.text(), &results);
        if query.debug() {
            self.debug_sink.write("context", &context);
        }

        let generated_response = match &self.generator {
            Some(generator) if !results.is_empty() => Some(generator.generate(query.text(), &context.render()).await),
            _ => None,
        };

        let execution_time = start.elapsed().as_secs_f64();
        info!(results = results.len(), elapsed_ms = (execution_time * 1000.0) as u64, "query complete");
        Ok(SearchResponse { query: query.text().to_string(), results, generated_response, execution_time })
    }
}

fn link_results(
    linker: &EntityLinker<Arc<dyn GraphStore>>,
    resolver: &RelationshipResolver<Arc<dyn GraphStore>>,
    merged: Vec<MergedCandidate>,
) -> Vec<SearchResult> {
    merged
        .into_iter()
        .map(|candidate| {
            let entities = linker.link(&candidate.content);
            let ids: Vec<_> = entities.iter().map(|e| e.id).collect();
            let relationships = resolver.resolve(&ids);
            debug!(doc_id = candidate.doc_id, entities = entities.len(), relationships = relationships.len(), "linked result");
            SearchResult { candidate, entities, relationships }
        })
        .collect()
}
