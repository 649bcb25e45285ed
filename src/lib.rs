//! Forward-computation core of a decoder-only sequence transformer.
//!
//! Token and position embeddings feed a stack of pre-norm residual blocks,
//! each combining causal multi-head self-attention with a position-wise
//! feed-forward sublayer; a final normalization and linear projection
//! produce next-token logits. Training, data loading and persistence live
//! outside this crate: parameters are created through a
//! [`candle_nn::VarBuilder`] so the caller's `VarMap` owns them.

pub mod attention;
pub mod block;
pub mod checks;
pub mod config;
pub mod error;
pub mod feed_forward;
pub mod mask;
pub mod model;
pub mod sampling;

pub use attention::{AttentionHead, MultiHeadAttention};
pub use block::Block;
pub use config::ModelConfig;
pub use error::{ModelError, Result};
pub use feed_forward::FeedForward;
pub use mask::CausalMask;
pub use model::SequenceModel;
pub use sampling::SamplingOptions;
