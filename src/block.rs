//! Transformer block: pre-norm residual composition of attention and
//! feed-forward sublayers.

use std::sync::Arc;

use candle_core::Tensor;
use candle_nn::{LayerNorm, Module, VarBuilder};

use crate::attention::MultiHeadAttention;
use crate::checks;
use crate::error::Result;
use crate::feed_forward::FeedForward;
use crate::mask::CausalMask;

/// One decoder block.
///
/// The identity path of each residual connection is never normalized or
/// transformed, so gradient flow cannot be fully blocked by either
/// sublayer. The order is normalize, transform, add.
#[derive(Debug)]
pub struct Block {
    attn: MultiHeadAttention,
    ffwd: FeedForward,
    ln1: LayerNorm,
    ln2: LayerNorm,
    n_embd: usize,
}

impl Block {
    /// Builds the two sublayers and their independent normalizations.
    ///
    /// Propagates a configuration error when `n_embd` is not divisible by
    /// `n_head`.
    pub fn new(
        n_embd: usize,
        n_head: usize,
        norm_eps: f64,
        dropout_rate: f32,
        mask: Arc<CausalMask>,
        vb: VarBuilder,
    ) -> Result<Self> {
        let attn = MultiHeadAttention::new(n_embd, n_head, mask, dropout_rate, vb.pp("attn"))?;
        let ffwd = FeedForward::new(n_embd, norm_eps, dropout_rate, vb.pp("mlp"))?;
        let ln1 = candle_nn::layer_norm(n_embd, norm_eps, vb.pp("ln1"))?;
        let ln2 = candle_nn::layer_norm(n_embd, norm_eps, vb.pp("ln2"))?;

        Ok(Self {
            attn,
            ffwd,
            ln1,
            ln2,
            n_embd,
        })
    }

    /// Forward pass: `x + attn(ln1(x))`, then `x + ffwd(ln2(x))`.
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        checks::expect_batch_seq_channels("block input", x, self.n_embd)?;

        let attn_out = self.attn.forward(&self.ln1.forward(x)?, train)?;
        let x = x.add(&attn_out)?;

        let ffwd_out = self.ffwd.forward(&self.ln2.forward(&x)?, train)?;
        let out = x.add(&ffwd_out)?;
        Ok(out)
    }
}
