use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use kag_core::traits::Embedder;

use crate::pool::masked_mean_l2;
use crate::tokenize::encode_batch;

const SLOW_EMBEDDING_MS: u128 = 100;
/// Texts per forward pass.
const FORWARD_BATCH: usize = 16;

/// XLM-RoBERTa family encoder (BGE-M3 by default) running through candle.
pub struct LocalEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl LocalEmbedder {
    /// Load `tokenizer.json`, `config.json` and `pytorch_model.bin` from
    /// `model_dir`.
    pub fn load(model_dir: PathBuf, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading local embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let weights = candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let dim = config.hidden_size;
        info!(dim, max_len, "local embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let batch = encode_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let hidden_states = self.model.forward(&batch.input_ids, &batch.attention_mask, &batch.token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden_states, &batch.attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        ensure!(vectors.len() == texts.len(), "model produced {} vectors for {} texts", vectors.len(), texts.len());
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(anyhow!("model produced {} dims, expected {}", v.len(), self.dim));
        }
        let elapsed = start.elapsed().as_millis();
        let per_text = elapsed / texts.len().max(1) as u128;
        if per_text > SLOW_EMBEDDING_MS {
            warn!(texts = texts.len(), elapsed_ms = elapsed as u64, "slow embedding batch");
        } else {
            debug!(texts = texts.len(), elapsed_ms = elapsed as u64, "embedded batch");
        }
        Ok(vectors)
    }
}

fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!("embedding device: Metal");
                return dev;
            }
            Err(e) => warn!(error = %e, "Metal unavailable, falling back to CPU"),
        }
    }
    info!("embedding device: CPU");
    Device::Cpu
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { self.max_len }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(FORWARD_BATCH) {
            out.extend(self.embed_chunk(chunk)?);
        }
        Ok(out)
    }
}

/// Locate the model directory: `APP_MODEL_DIR`, then `MODEL_DIR`, then
/// `models/bge-m3` relative to the working directory or its parent.
pub fn resolve_model_dir() -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { info!(var, dir = %p.display(), "using model dir from env"); return Ok(p); }
        }
    }
    for candidate in ["models/bge-m3", "../models/bge-m3"] {
        let p = Path::new(candidate);
        if p.exists() { info!(dir = %p.display(), "using model dir"); return Ok(p.to_path_buf()); }
    }
    Err(kag_core::Error::NotFound("BGE-M3 model directory (set APP_MODEL_DIR or place it under models/bge-m3)".to_string()).into())
}
