use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Average `hidden` `[B,T,H]` over the positions where `attention_mask`
/// `[B,T]` is set. Rows with no unmasked token pool to zeros.
pub fn masked_mean(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, tokens, _) = hidden.dims3()?;
    ensure!(
        attention_mask.dims() == [batch, tokens],
        "mask shape {:?} does not match hidden states [{batch}, {tokens}, _]",
        attention_mask.dims()
    );
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let counts = mask.sum_keepdim(1)?.maximum(1f64)?;
    Ok(summed.broadcast_div(&counts)?)
}

/// Scale each row of `[B,H]` to unit length.
pub fn l2_normalize(rows: &Tensor) -> Result<Tensor> {
    let eps = match rows.dtype() { DType::F16 | DType::BF16 => 1e-6, _ => 1e-12 };
    let norms = (rows.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    Ok(rows.broadcast_div(&norms)?)
}

/// Sentence embedding: masked mean pooling followed by L2 normalization.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    l2_normalize(&masked_mean(hidden, attention_mask)?)
}
