use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use tokenizers::Tokenizer;

/// XLM-RoBERTa padding token id.
const PAD_TOKEN_ID: u32 = 1;

/// Model inputs for one forward pass, all shaped `[B, T]`.
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Tokenize `texts` as one batch. Every row is cut to `max_len` tokens and
/// right-padded to the longest row, so short batches stay narrow.
pub fn encode_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<EncodedBatch> {
    let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let encodings = tokenizer.encode_batch(inputs, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let rows = encodings.iter().map(|e| (e.get_ids().to_vec(), e.get_attention_mask().to_vec())).collect();
    let (ids, mask, width) = pad_rows(rows, max_len);
    let batch = texts.len();
    Ok(EncodedBatch {
        input_ids: Tensor::from_vec(ids, (batch, width), device)?,
        attention_mask: Tensor::from_vec(mask, (batch, width), device)?,
        token_type_ids: Tensor::zeros((batch, width), DType::I64, device)?,
    })
}

/// Flatten `(ids, mask)` rows into row-major buffers of equal width.
/// Returns the buffers and that width.
pub fn pad_rows(rows: Vec<(Vec<u32>, Vec<u32>)>, max_len: usize) -> (Vec<u32>, Vec<u32>, usize) {
    let width = rows.iter().map(|(ids, _)| ids.len().min(max_len)).max().unwrap_or(0).max(1);
    let mut ids_out = Vec::with_capacity(rows.len() * width);
    let mut mask_out = Vec::with_capacity(rows.len() * width);
    for (mut ids, mut mask) in rows {
        ids.truncate(width);
        mask.truncate(width);
        ids.resize(width, PAD_TOKEN_ID);
        mask.resize(width, 0);
        ids_out.extend(ids);
        mask_out.extend(mask);
    }
    (ids_out, mask_out, width)
}
