use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use kag_core::config::Settings;
use kag_core::traits::LanguageModel;
use kag_embed::embedder_from_settings;
use kag_graph::SqliteGraphStore;
use kag_hybrid::EngineComponents;
use kag_llm::OpenAiChatClient;
use kag_text::TantivyTextIndex;
use kag_vector::LanceVectorIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Wipe and recreate both indexes.
    Rebuild,
    Open,
}

pub async fn components(settings: &Settings, mode: Mode) -> Result<EngineComponents> {
    let storage = &settings.storage;
    let embedder = embedder_from_settings(&settings.embedding)?;
    let dim = embedder.dim();

    let (text_index, vector_index) = match mode {
        Mode::Rebuild => (
            TantivyTextIndex::create(&storage.tantivy_path())?,
            LanceVectorIndex::create(&storage.lancedb_path(), &storage.lancedb_table, dim).await?,
        ),
        Mode::Open => (
            TantivyTextIndex::open(&storage.tantivy_path())
                .with_context(|| format!("no text index at {}; run `kag ingest <DIR>` first", storage.tantivy_index_dir))?,
            LanceVectorIndex::open(&storage.lancedb_path(), &storage.lancedb_table, dim).await?,
        ),
    };
    let graph = SqliteGraphStore::open(&storage.graph_path())?;

    let chat = if settings.generation.enabled || settings.expansion.enabled {
        match OpenAiChatClient::from_settings(&settings.llm) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "language model unavailable, generation and expansion disabled");
                None
            }
        }
    } else {
        None
    };
    let expansion_llm: Option<Arc<dyn LanguageModel>> = chat.as_ref().filter(|_| settings.expansion.enabled).map(|client| {
        let model = settings.expansion.model.as_deref().unwrap_or(client.model());
        Arc::new(client.with_model(model)) as Arc<dyn LanguageModel>
    });
    let llm: Option<Arc<dyn LanguageModel>> = chat
        .filter(|_| settings.generation.enabled)
        .map(|c| Arc::new(c) as Arc<dyn LanguageModel>);

    Ok(EngineComponents {
        embedder: Arc::from(embedder),
        vector_index: Arc::new(vector_index),
        text_index: Arc::new(text_index),
        graph: Arc::new(graph),
        llm,
        expansion_llm,
    })
}
