//! Remote embedding endpoint speaking the OpenAI `/embeddings` protocol.

use std::time::Duration;

use anyhow::{anyhow, bail, ensure, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use kag_core::config::EmbeddingSettings;
use kag_core::traits::Embedder;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dim: usize,
    max_len: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, dim: usize, max_len: usize) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, endpoint: endpoint.into(), api_key: api_key.into(), model: model.into(), dim, max_len })
    }

    /// Reads the API key from the environment variable named by
    /// `settings.api_key_env`.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .map_err(|_| anyhow!("{} is not set; required by the openai embedding provider", settings.api_key_env))?;
        Self::new(&settings.endpoint, api_key, &settings.model, settings.dim, settings.max_len)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { self.max_len }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(vec![]); }
        debug!(count = texts.len(), model = %self.model, "requesting embeddings");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "embedding request rejected");
            bail!("embedding API returned {status}: {body}");
        }

        let parsed: EmbedResponse = response.json().await?;
        ensure!(parsed.data.len() == texts.len(), "embedding API returned {} vectors for {} inputs", parsed.data.len(), texts.len());
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            bail!("embedding API returned {} dims, expected {}", bad.len(), self.dim);
        }
        Ok(vectors)
    }
}
