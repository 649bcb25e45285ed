//! Position-wise feed-forward sublayer.
//!
//! Operates on each time step's channel vector independently; there is no
//! mixing across the sequence axis here. The sublayer carries its own input
//! normalization in addition to the block-level pre-norm.

use candle_core::Tensor;
use candle_nn::{Dropout, LayerNorm, Linear, Module, VarBuilder};

use crate::error::{ModelError, Result};

/// Expansion factor between the embedding width and the inner projection.
const EXPANSION: usize = 4;

/// Two-layer projection with an internal input norm: normalize, expand to
/// `4 * n_embd`, rectify, contract back, then dropout.
#[derive(Debug)]
pub struct FeedForward {
    norm: LayerNorm,
    expand: Linear,
    project: Linear,
    dropout: Dropout,
}

impl FeedForward {
    pub fn new(
        n_embd: usize,
        norm_eps: f64,
        dropout_rate: f32,
        vb: VarBuilder,
    ) -> Result<Self> {
        if n_embd == 0 {
            return Err(ModelError::InvalidConfig {
                message: "feed-forward width must be greater than zero".to_string(),
            });
        }

        let inner = EXPANSION * n_embd;
        let norm = candle_nn::layer_norm(n_embd, norm_eps, vb.pp("norm"))?;
        let expand = candle_nn::linear(n_embd, inner, vb.pp("expand"))?;
        let project = candle_nn::linear(inner, n_embd, vb.pp("project"))?;
        let dropout = Dropout::new(dropout_rate);

        Ok(Self {
            norm,
            expand,
            project,
            dropout,
        })
    }

    /// Forward pass; output shape equals input shape.
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let x = self.norm.forward(x)?;
        let x = self.expand.forward(&x)?;
        let x = x.relu()?;
        let x = self.project.forward(&x)?;
        let out = self.dropout.forward(&x, train)?;
        Ok(out)
    }
}
