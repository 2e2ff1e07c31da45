//! Learned score from a frozen speech-representation model
//!
//! The encoder sits behind the narrow [`SpeechEncoder`] trait so the
//! inference engine can be swapped without touching the pipeline. The
//! [`ScorerHead`] is a small feed-forward network ending in a sigmoid.

use crate::error::{InferenceError, ModelLoadError};
use crate::models::{Embedding, Waveform};
use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use std::path::Path;
use std::sync::Arc;

/// Pooled embedding extraction from a waveform
///
/// Implementations are immutable after loading and shared across requests.
pub trait SpeechEncoder: Send + Sync {
    /// Pooled embedding of length [`SpeechEncoder::dimension`]
    fn embed(&self, waveform: &Waveform) -> Result<Embedding, InferenceError>;

    /// Embedding length
    fn dimension(&self) -> usize;

    /// Shortest input that yields at least one output frame
    fn min_samples(&self) -> usize;
}

/// Read a safetensors file into a CPU var builder
pub(crate) fn load_safetensors(path: &Path) -> Result<VarBuilder<'static>, ModelLoadError> {
    std::fs::metadata(path).map_err(|source| ModelLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let device = Device::Cpu;
    let tensors = candle_core::safetensors::load(path, &device)
        .map_err(|e| ModelLoadError::Weights(format!("{}: {}", path.display(), e)))?;

    tracing::debug!(path = %path.display(), tensors = tensors.len(), "Loaded safetensors");

    Ok(VarBuilder::from_tensors(tensors, DType::F32, &device))
}

// ============================================================================
// Scorer head
// ============================================================================

/// Feed-forward classifier: (Linear, ReLU)* then Linear to one logit
///
/// Tensor names: `layers.{i}.weight|bias` for the hidden layers,
/// `output.weight|bias` for the logit.
pub struct ScorerHead {
    hidden: Vec<Linear>,
    output: Linear,
    input_dim: usize,
    device: Device,
}

impl ScorerHead {
    pub fn new(input_dim: usize, hidden_dims: &[usize], vb: VarBuilder) -> candle_core::Result<Self> {
        let mut hidden = Vec::with_capacity(hidden_dims.len());
        let mut in_dim = input_dim;
        for (i, &out_dim) in hidden_dims.iter().enumerate() {
            hidden.push(candle_nn::linear(in_dim, out_dim, vb.pp(format!("layers.{}", i)))?);
            in_dim = out_dim;
        }
        let output = candle_nn::linear(in_dim, 1, vb.pp("output"))?;

        Ok(Self {
            hidden,
            output,
            input_dim,
            device: vb.device().clone(),
        })
    }

    /// Load head weights from a safetensors file
    pub fn load(path: &Path, input_dim: usize, hidden_dims: &[usize]) -> Result<Self, ModelLoadError> {
        let vb = load_safetensors(path)?;
        let head = Self::new(input_dim, hidden_dims, vb)?;
        tracing::info!(
            path = %path.display(),
            input_dim = input_dim,
            hidden = ?hidden_dims,
            "Scorer head loaded"
        );
        Ok(head)
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Probability in [0, 1] that the embedding belongs to synthetic speech
    pub fn score(&self, embedding: &Embedding) -> Result<f64, InferenceError> {
        if embedding.dimension() != self.input_dim {
            return Err(InferenceError::DimensionMismatch {
                expected: self.input_dim,
                got: embedding.dimension(),
            });
        }

        let mut x = Tensor::from_slice(embedding.as_slice(), (1, self.input_dim), &self.device)?;
        for layer in &self.hidden {
            x = layer.forward(&x)?.relu()?;
        }
        let logit = self.output.forward(&x)?;
        let probability = candle_nn::ops::sigmoid(&logit)?
            .flatten_all()?
            .to_vec1::<f32>()?
            .first()
            .copied()
            .ok_or_else(|| InferenceError::Numerical("scorer produced no output".to_string()))?;

        if !probability.is_finite() {
            return Err(InferenceError::Numerical(format!(
                "scorer output is not finite: {}",
                probability
            )));
        }

        Ok((probability as f64).clamp(0.0, 1.0))
    }
}

// ============================================================================
// Embedding scorer
// ============================================================================

/// Encoder plus scorer head
pub struct EmbeddingScorer {
    encoder: Arc<dyn SpeechEncoder>,
    head: ScorerHead,
}

impl EmbeddingScorer {
    /// Pair an encoder with a head; their dimensions must agree
    pub fn new(encoder: Arc<dyn SpeechEncoder>, head: ScorerHead) -> Result<Self, ModelLoadError> {
        if encoder.dimension() != head.input_dim() {
            return Err(ModelLoadError::Config(format!(
                "scorer head expects {} inputs but encoder produces {}",
                head.input_dim(),
                encoder.dimension()
            )));
        }
        Ok(Self { encoder, head })
    }

    pub fn min_samples(&self) -> usize {
        self.encoder.min_samples()
    }

    /// Model score in [0, 1]
    ///
    /// # Errors
    /// * `AudioTooShort` - checked before running the encoder
    /// * `DimensionMismatch` - embedding length differs from the head input
    /// * `Numerical` - non-finite embedding or score
    /// * `Backend` - tensor operation failure
    pub fn score(&self, waveform: &Waveform) -> Result<f64, InferenceError> {
        let min_samples = self.encoder.min_samples();
        if waveform.len() < min_samples {
            return Err(InferenceError::AudioTooShort {
                min_samples,
                got_samples: waveform.len(),
            });
        }

        let embedding = self.encoder.embed(waveform)?;
        if embedding.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::Numerical(
                "embedding contains non-finite values".to_string(),
            ));
        }

        let score = self.head.score(&embedding)?;
        tracing::debug!(
            dimension = embedding.dimension(),
            model_score = format!("{:.4}", score),
            "Embedding scored"
        );
        Ok(score)
    }
}
