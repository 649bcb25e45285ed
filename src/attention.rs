//! Causal self-attention: single heads and their multi-head combination.

use std::sync::Arc;

use candle_core::{Tensor, D};
use candle_nn::{ops::softmax_last_dim, Dropout, Linear, Module, VarBuilder};

use crate::checks;
use crate::error::{ModelError, Result};
use crate::mask::CausalMask;

/// One head of scaled dot-product self-attention.
///
/// Maps `(batch, seq, n_embd)` to `(batch, seq, head_size)` while only
/// letting each position attend to itself and earlier positions.
#[derive(Debug)]
pub struct AttentionHead {
    key: Linear,
    query: Linear,
    value: Linear,
    dropout: Dropout,
    mask: Arc<CausalMask>,
    n_embd: usize,
    head_size: usize,
    scale: f64,
}

impl AttentionHead {
    /// Builds the three bias-free projections of one head.
    ///
    /// `mask` is the shared causal mask for the model's context length; its
    /// size bounds the sequence lengths this head will accept.
    pub fn new(
        n_embd: usize,
        head_size: usize,
        mask: Arc<CausalMask>,
        dropout_rate: f32,
        vb: VarBuilder,
    ) -> Result<Self> {
        if n_embd == 0 || head_size == 0 {
            return Err(ModelError::InvalidConfig {
                message: "attention head dimensions must be greater than zero".to_string(),
            });
        }

        let key = candle_nn::linear_no_bias(n_embd, head_size, vb.pp("key"))?;
        let query = candle_nn::linear_no_bias(n_embd, head_size, vb.pp("query"))?;
        let value = candle_nn::linear_no_bias(n_embd, head_size, vb.pp("value"))?;
        let dropout = Dropout::new(dropout_rate);

        // scaled dot-product attention: the constant is the head width,
        // not the embedding width
        let scale = 1.0 / (head_size as f64).sqrt();

        Ok(Self {
            key,
            query,
            value,
            dropout,
            mask,
            n_embd,
            head_size,
            scale,
        })
    }

    /// Channel width of this head's output.
    pub fn head_size(&self) -> usize {
        self.head_size
    }

    /// Row-stochastic attention weights, shape `(batch, seq, seq)`.
    ///
    /// Masked (future) entries are exactly zero after the softmax. Dropout
    /// on the weights is active only when `train` is set.
    fn attention_weights(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let (_batch, seq_len) =
            checks::expect_batch_seq_channels("attention input", x, self.n_embd)?;

        let queries = self.query.forward(x)?;
        let keys = self.key.forward(x)?;

        let scores = queries.matmul(&keys.transpose(1, 2)?)?;
        let scaled = scores.affine(self.scale, 0.0)?;
        let masked = scaled.broadcast_add(&self.mask.slice(seq_len)?)?;
        let weights = softmax_last_dim(&masked)?;
        let weights = self.dropout.forward(&weights, train)?;

        Ok(weights)
    }

    /// Forward pass: weighted aggregation of values under the causal mask.
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let weights = self.attention_weights(x, train)?;
        let values = self.value.forward(x)?;
        let out = weights.matmul(&values)?;
        Ok(out)
    }
}

/// Several attention heads run over the same input in parallel, their
/// outputs concatenated along the channel axis and projected back to the
/// embedding width.
#[derive(Debug)]
pub struct MultiHeadAttention {
    heads: Vec<AttentionHead>,
    proj: Linear,
    dropout: Dropout,
}

impl MultiHeadAttention {
    /// Builds `n_head` independent heads of width `n_embd / n_head`.
    ///
    /// Fails with a configuration error when the embedding width is not an
    /// exact multiple of the head count.
    pub fn new(
        n_embd: usize,
        n_head: usize,
        mask: Arc<CausalMask>,
        dropout_rate: f32,
        vb: VarBuilder,
    ) -> Result<Self> {
        if n_head == 0 {
            return Err(ModelError::InvalidConfig {
                message: "n_head must be greater than zero".to_string(),
            });
        }
        if n_embd % n_head != 0 {
            return Err(ModelError::InvalidConfig {
                message: format!("n_embd ({n_embd}) must be divisible by n_head ({n_head})"),
            });
        }

        let head_size = n_embd / n_head;
        let mut heads = Vec::with_capacity(n_head);
        for index in 0..n_head {
            heads.push(AttentionHead::new(
                n_embd,
                head_size,
                Arc::clone(&mask),
                dropout_rate,
                vb.pp(format!("head_{index}")),
            )?);
        }

        let proj = candle_nn::linear(n_embd, n_embd, vb.pp("proj"))?;
        let dropout = Dropout::new(dropout_rate);

        Ok(Self {
            heads,
            proj,
            dropout,
        })
    }

    /// Forward pass preserving the `(batch, seq, n_embd)` shape.
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let mut outputs = Vec::with_capacity(self.heads.len());
        for head in &self.heads {
            outputs.push(head.forward(x, train)?);
        }

        let concatenated = Tensor::cat(&outputs, D::Minus1)?;
        let projected = self.proj.forward(&concatenated)?;
        let out = self.dropout.forward(&projected, train)?;
        Ok(out)
    }
}
