//! Causal attention mask, built once and shared read-only.
//!
//! The mask is additive: `0.0` where a query position may attend to a key
//! position (`key <= query`) and `f32::NEG_INFINITY` where it may not.
//! Adding it to raw attention scores before the softmax forces forbidden
//! positions to a weight of exactly zero.

use candle_core::{Device, Tensor};

use crate::error::{ModelError, Result};

/// Lower-triangular additive mask for one configured context length.
///
/// Constructed once per model, then shared (behind an `Arc`) by every
/// attention head. Never mutated after construction.
#[derive(Debug)]
pub struct CausalMask {
    len: usize,
    bias: Tensor,
}

impl CausalMask {
    /// Builds the `(len, len)` additive mask on the given device.
    pub fn new(len: usize, device: &Device) -> Result<Self> {
        if len == 0 {
            return Err(ModelError::InvalidConfig {
                message: "causal mask length must be greater than zero".to_string(),
            });
        }

        let mut data = vec![0f32; len * len];
        for query in 0..len {
            for key in (query + 1)..len {
                data[query * len + key] = f32::NEG_INFINITY;
            }
        }
        let bias = Tensor::from_vec(data, (len, len), device)?;

        Ok(Self { len, bias })
    }

    /// The configured maximum sequence length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the `(seq_len, seq_len)` view of the mask for a call.
    ///
    /// Sequence lengths beyond the configured maximum are fatal; there is
    /// no implicit truncation or extension.
    pub fn slice(&self, seq_len: usize) -> Result<Tensor> {
        if seq_len == 0 || seq_len > self.len {
            return Err(ModelError::ShapeMismatch {
                context: format!(
                    "sequence length {seq_len} outside the configured mask size {}",
                    self.len
                ),
            });
        }
        let view = self.bias.narrow(0, 0, seq_len)?.narrow(1, 0, seq_len)?;
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_triangle_is_open_upper_is_blocked() {
        let mask = CausalMask::new(4, &Device::Cpu).unwrap();
        let rows = mask.slice(4).unwrap().to_vec2::<f32>().unwrap();

        for (i, row) in rows.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                if j <= i {
                    assert_eq!(value, 0.0, "position ({i}, {j}) should be open");
                } else {
                    assert_eq!(
                        value,
                        f32::NEG_INFINITY,
                        "position ({i}, {j}) should be blocked"
                    );
                }
            }
        }
    }

    #[test]
    fn slice_returns_leading_square() {
        let mask = CausalMask::new(8, &Device::Cpu).unwrap();
        let view = mask.slice(3).unwrap();
        assert_eq!(view.dims(), &[3, 3]);

        let rows = view.to_vec2::<f32>().unwrap();
        assert_eq!(rows[0][1], f32::NEG_INFINITY);
        assert_eq!(rows[2][0], 0.0);
    }

    #[test]
    fn oversized_slice_is_rejected() {
        let mask = CausalMask::new(4, &Device::Cpu).unwrap();
        let err = mask.slice(5).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }

    #[test]
    fn zero_length_mask_is_rejected() {
        let err = CausalMask::new(0, &Device::Cpu).unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig { .. }));
    }
}
