//! Top-level decoder-only model producing next-token logits.

use std::sync::Arc;

use candle_core::Tensor;
use candle_nn::{Embedding, LayerNorm, Linear, Module, VarBuilder};

use crate::block::Block;
use crate::checks;
use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::mask::CausalMask;

/// Token and position embeddings, a stack of decoder blocks, a final
/// normalization, and a linear projection to vocabulary logits.
///
/// The model is a pure function of its parameters and input, apart from
/// dropout randomness in training mode. Loss computation, optimization and
/// checkpointing belong to the caller.
#[derive(Debug)]
pub struct SequenceModel {
    config: ModelConfig,
    token_embedding: Embedding,
    position_embedding: Embedding,
    blocks: Vec<Block>,
    final_norm: LayerNorm,
    lm_head: Linear,
}

impl SequenceModel {
    /// Validates `config` and builds every parameter eagerly.
    ///
    /// The causal mask is created once for `config.block_size` and shared
    /// read-only by every attention head in the stack.
    pub fn new(config: ModelConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;

        let device = vb.device().clone();
        let mask = Arc::new(CausalMask::new(config.block_size, &device)?);

        let token_embedding =
            candle_nn::embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let position_embedding =
            candle_nn::embedding(config.block_size, config.n_embd, vb.pp("wpe"))?;

        let mut blocks = Vec::with_capacity(config.n_block);
        for index in 0..config.n_block {
            blocks.push(Block::new(
                config.n_embd,
                config.n_head,
                config.norm_eps,
                config.dropout_rate,
                Arc::clone(&mask),
                vb.pp(format!("h.{index}")),
            )?);
        }

        let final_norm = candle_nn::layer_norm(config.n_embd, config.norm_eps, vb.pp("ln_f"))?;
        let lm_head = candle_nn::linear(config.n_embd, config.vocab_size, vb.pp("lm_head"))?;

        let model = Self {
            config,
            token_embedding,
            position_embedding,
            blocks,
            final_norm,
            lm_head,
        };

        log::info!(
            "sequence model built: vocab={} width={} heads={} blocks={} context={} params={}",
            model.config.vocab_size,
            model.config.n_embd,
            model.config.n_head,
            model.config.n_block,
            model.config.block_size,
            model.count_parameters()
        );

        Ok(model)
    }

    /// The configuration the model was built from.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Maps `(batch, seq)` token indices to `(batch, seq, vocab_size)`
    /// logits. No softmax is applied.
    ///
    /// Sequences longer than the configured `block_size` are fatal; they
    /// are never truncated here.
    pub fn forward(&self, tokens: &Tensor, train: bool) -> Result<Tensor> {
        let (_batch, seq_len) = checks::expect_token_matrix("model input", tokens)?;
        if seq_len == 0 || seq_len > self.config.block_size {
            return Err(ModelError::ShapeMismatch {
                context: format!(
                    "sequence length {seq_len} outside the configured block size {}",
                    self.config.block_size
                ),
            });
        }

        let tok_emb = self.token_embedding.forward(tokens)?;
        let positions = Tensor::arange(0u32, seq_len as u32, tokens.device())?;
        let pos_emb = self.position_embedding.forward(&positions)?;
        let mut x = tok_emb.broadcast_add(&pos_emb)?;

        for block in &self.blocks {
            x = block.forward(&x, train)?;
        }

        let x = self.final_norm.forward(&x)?;
        let logits = self.lm_head.forward(&x)?;
        Ok(logits)
    }

    /// Number of scalar parameters held by the model.
    pub fn count_parameters(&self) -> usize {
        let c = self.config.n_embd;
        let v = self.config.vocab_size;
        let head_size = self.config.head_size();

        let embeddings = v * c + self.config.block_size * c;
        let attention = 3 * c * head_size * self.config.n_head + c * c + c;
        let feed_forward = 2 * c + (c * 4 * c + 4 * c) + (4 * c * c + c);
        let norms = 2 * (2 * c);
        let per_block = attention + feed_forward + norms;
        let head = c * v + v;

        embeddings + self.config.n_block * per_block + 2 * c + head
    }
}
