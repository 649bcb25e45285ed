//! Model configuration and structural validation.

use crate::error::{ModelError, Result};

/// Hyperparameters describing the model geometry.
///
/// All parameters are fixed at construction; there is no deferred or
/// shape-dependent initialization later on.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Number of distinct token indices the model accepts and predicts.
    pub vocab_size: usize,
    /// Embedding width shared by every sublayer (`C`).
    pub n_embd: usize,
    /// Number of attention heads per block. Must divide `n_embd` evenly.
    pub n_head: usize,
    /// Number of stacked transformer blocks.
    pub n_block: usize,
    /// Maximum sequence length; sizes the causal mask and position table.
    pub block_size: usize,
    /// Dropout probability applied at every dropout site in `[0, 1)`.
    pub dropout_rate: f32,
    /// Numeric stabilizer for every layer normalization.
    pub norm_eps: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            vocab_size: 65,
            n_embd: 384,
            n_head: 6,
            n_block: 6,
            block_size: 256,
            dropout_rate: 0.1,
            norm_eps: 1e-5,
        }
    }
}

impl ModelConfig {
    /// Checks the structural invariants, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(invalid("vocab_size must be greater than zero"));
        }
        if self.n_embd == 0 {
            return Err(invalid("n_embd must be greater than zero"));
        }
        if self.n_head == 0 {
            return Err(invalid("n_head must be greater than zero"));
        }
        if self.n_embd % self.n_head != 0 {
            return Err(ModelError::InvalidConfig {
                message: format!(
                    "n_embd ({}) must be divisible by n_head ({})",
                    self.n_embd, self.n_head
                ),
            });
        }
        if self.n_block == 0 {
            return Err(invalid("n_block must be greater than zero"));
        }
        if self.block_size == 0 {
            return Err(invalid("block_size must be greater than zero"));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(ModelError::InvalidConfig {
                message: format!(
                    "dropout_rate must be in [0, 1), got {}",
                    self.dropout_rate
                ),
            });
        }
        if !self.norm_eps.is_finite() || self.norm_eps <= 0.0 {
            return Err(invalid("norm_eps must be a positive finite value"));
        }
        Ok(())
    }

    /// Channel width of each attention head.
    pub fn head_size(&self) -> usize {
        self.n_embd / self.n_head
    }
}

fn invalid(message: &str) -> ModelError {
    ModelError::InvalidConfig {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ModelConfig::default();
        config.validate().unwrap();
        assert_eq!(config.head_size(), 64);
    }

    #[test]
    fn indivisible_head_count_is_rejected() {
        let config = ModelConfig {
            n_embd: 5,
            n_head: 2,
            ..ModelConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig { .. }));
    }

    #[test]
    fn out_of_range_dropout_is_rejected() {
        for rate in [-0.1f32, 1.0, 1.5] {
            let config = ModelConfig {
                dropout_rate: rate,
                ..ModelConfig::default()
            };
            assert!(config.validate().is_err(), "rate {rate} should fail");
        }
    }

    #[test]
    fn zero_sized_dimensions_are_rejected() {
        for field in 0..5 {
            let mut config = ModelConfig::default();
            match field {
                0 => config.vocab_size = 0,
                1 => config.n_embd = 0,
                2 => config.n_head = 0,
                3 => config.n_block = 0,
                _ => config.block_size = 0,
            }
            assert!(config.validate().is_err(), "field {field} should fail");
        }
    }
}
