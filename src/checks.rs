//! Shape validation helpers shared across the forward paths.
//!
//! These return [`crate::error::Result`] so call sites can propagate a
//! [`ModelError::ShapeMismatch`](crate::error::ModelError) with `?` instead
//! of panicking.

use candle_core::Tensor;

use crate::error::{ModelError, Result};

/// Validates the `(batch, seq, channels)` convention with a known channel
/// width and returns the batch and sequence dimensions.
pub fn expect_batch_seq_channels(
    context: &str,
    tensor: &Tensor,
    channels: usize,
) -> Result<(usize, usize)> {
    match tensor.dims() {
        [batch, seq, actual] if *actual == channels => Ok((*batch, *seq)),
        dims => Err(ModelError::ShapeMismatch {
            context: format!("{context} expected (batch, seq, {channels}), got {dims:?}"),
        }),
    }
}

/// Validates a `(batch, seq)` integer token matrix and returns its
/// dimensions.
pub fn expect_token_matrix(context: &str, tensor: &Tensor) -> Result<(usize, usize)> {
    match tensor.dims() {
        [batch, seq] => Ok((*batch, *seq)),
        dims => Err(ModelError::ShapeMismatch {
            context: format!("{context} expected (batch, seq) token indices, got {dims:?}"),
        }),
    }
}
