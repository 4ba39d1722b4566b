use anyhow::Result;
use tracing::info;

use kag_core::config::{EmbeddingProvider, EmbeddingSettings};
use kag_core::traits::Embedder;

mod hash;
mod local;
mod openai;
mod pool;
mod tokenize;

pub use hash::HashEmbedder;
pub use local::{resolve_model_dir, LocalEmbedder};
pub use openai::OpenAiEmbedder;
pub use pool::{l2_normalize, masked_mean, masked_mean_l2};
pub use tokenize::{encode_batch, pad_rows, EncodedBatch};

/// Build the embedder named by `settings.provider`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` overrides the configured provider with the
/// deterministic [`HashEmbedder`], which is what tests and offline demos use.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() {
        info!(dim = settings.dim, "APP_USE_FAKE_EMBEDDINGS set, using hash embedder");
        return Ok(Box::new(HashEmbedder::new(settings.dim)));
    }
    match settings.provider {
        EmbeddingProvider::Hash => Ok(Box::new(HashEmbedder::new(settings.dim))),
        EmbeddingProvider::Local => Ok(Box::new(LocalEmbedder::load(resolve_model_dir()?, settings.max_len)?)),
        EmbeddingProvider::OpenAi => Ok(Box::new(OpenAiEmbedder::from_settings(settings)?)),
    }
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
