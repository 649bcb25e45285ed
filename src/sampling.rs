//! Autoregressive generation and logits sampling strategies.
//!
//! The model itself stops at raw logits; everything here is a consumer of
//! that contract. Sampling happens on host-side rows, one draw per batch
//! element per step.

use candle_core::Tensor;

use crate::error::Result;
use crate::model::SequenceModel;

/// Knobs for turning a logits row into a token index.
#[derive(Debug, Clone)]
pub struct SamplingOptions {
    /// Softmax temperature. Values at or below zero select greedily.
    pub temperature: f64,
    /// Keep only the `k` highest-scoring tokens before sampling.
    pub top_k: Option<usize>,
    /// Nucleus sampling: keep the smallest set of tokens whose cumulative
    /// probability reaches this threshold.
    pub top_p: Option<f64>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        SamplingOptions {
            temperature: 1.0,
            top_k: None,
            top_p: None,
        }
    }
}

impl SequenceModel {
    /// Extends `context` by `max_new_tokens` sampled tokens.
    ///
    /// `context` is a `(batch, seq)` token matrix. When the running
    /// sequence outgrows the configured context length, only the most
    /// recent `block_size` tokens are fed back into the model.
    pub fn generate_with_sampling(
        &self,
        context: &Tensor,
        max_new_tokens: usize,
        options: &SamplingOptions,
    ) -> Result<Tensor> {
        let block_size = self.config().block_size;
        let mut sequence = context.clone();

        for _ in 0..max_new_tokens {
            let (_batch, seq_len) = sequence.dims2()?;
            let window = if seq_len > block_size {
                log::debug!("cropping generation context from {seq_len} to {block_size}");
                sequence.narrow(1, seq_len - block_size, block_size)?
            } else {
                sequence.clone()
            };

            let logits = self.forward(&window, false)?;
            let last = logits.narrow(1, logits.dim(1)? - 1, 1)?.squeeze(1)?;
            let next = sample_next_token(&last, options)?;
            sequence = Tensor::cat(&[&sequence, &next], 1)?;
        }

        Ok(sequence)
    }

    /// Generation with default sampling (temperature 1.0, no filtering).
    pub fn generate(&self, context: &Tensor, max_new_tokens: usize) -> Result<Tensor> {
        self.generate_with_sampling(context, max_new_tokens, &SamplingOptions::default())
    }
}

/// Samples one token per batch row from a `(batch, vocab)` logits tensor,
/// returning a `(batch, 1)` index tensor.
pub fn sample_next_token(logits: &Tensor, options: &SamplingOptions) -> Result<Tensor> {
    let (batch, _vocab) = logits.dims2()?;
    let rows = logits.to_vec2::<f32>()?;

    let mut sampled = Vec::with_capacity(batch);
    for row in &rows {
        sampled.push(sample_from_row(row, options) as u32);
    }

    let next = Tensor::from_vec(sampled, (batch, 1), logits.device())?;
    Ok(next)
}

/// Turns one logits row into a token index according to `options`.
pub fn sample_from_row(logits: &[f32], options: &SamplingOptions) -> usize {
    if logits.is_empty() {
        return 0;
    }
    if options.temperature <= 0.0 {
        return argmax(logits);
    }

    let inv_temp = (1.0 / options.temperature.max(1e-4)) as f32;
    let mut adjusted: Vec<f32> = logits.iter().map(|&logit| logit * inv_temp).collect();

    if let Some(k) = options.top_k {
        let k = k.max(1);
        if k < adjusted.len() {
            let mut order: Vec<usize> = (0..adjusted.len()).collect();
            order.sort_unstable_by(|a, b| {
                adjusted[*b]
                    .partial_cmp(&adjusted[*a])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for &index in order.iter().skip(k) {
                adjusted[index] = f32::NEG_INFINITY;
            }
        }
    }

    let max_logit = adjusted.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0f32;
    let mut probabilities: Vec<f32> = adjusted
        .iter()
        .map(|&logit| {
            let value = if logit.is_finite() {
                (logit - max_logit).exp()
            } else {
                0.0
            };
            sum += value;
            value
        })
        .collect();

    if sum <= f32::EPSILON {
        return fastrand::usize(0..logits.len());
    }
    for probability in probabilities.iter_mut() {
        *probability /= sum;
    }

    if let Some(threshold) = options.top_p {
        apply_top_p(&mut probabilities, threshold as f32);
    }

    let draw = fastrand::f32();
    let mut cumulative = 0f32;
    for (index, &probability) in probabilities.iter().enumerate() {
        cumulative += probability;
        if draw <= cumulative {
            return index;
        }
    }

    argmax(&probabilities)
}

/// Zeroes every token outside the smallest nucleus whose cumulative
/// probability reaches `threshold`, then renormalizes.
fn apply_top_p(probabilities: &mut [f32], threshold: f32) {
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_unstable_by(|a, b| {
        probabilities[*b]
            .partial_cmp(&probabilities[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut allowed = vec![false; probabilities.len()];
    let mut cumulative = 0f32;
    for index in order {
        cumulative += probabilities[index];
        allowed[index] = true;
        if cumulative >= threshold {
            break;
        }
    }

    for (index, probability) in probabilities.iter_mut().enumerate() {
        if !allowed[index] {
            *probability = 0.0;
        }
    }
    let remaining: f32 = probabilities.iter().sum();
    if remaining > f32::EPSILON {
        for probability in probabilities.iter_mut() {
            *probability /= remaining;
        }
    }
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(index, _)| index)
        .unwrap_or(0)
}
