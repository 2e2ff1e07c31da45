//! wav2vec2-style speech encoder on candle
//!
//! Loads a HuggingFace `config.json` plus `.safetensors` weights and mean-pools
//! the last hidden state into one embedding.
//!
//! **Architecture (post-LN "base" layout):**
//! 1. Zero-mean / unit-variance input normalization
//! 2. Convolutional feature encoder (group norm on layer 0, GELU)
//! 3. Feature projection (layer norm, linear)
//! 4. Weight-normalized convolutional positional embedding
//! 5. Transformer layers (self-attention, feed-forward, post layer norm)
//! 6. Mean pooling over time

use crate::error::{InferenceError, ModelLoadError};
use crate::models::{Embedding, Waveform};
use crate::services::embedding_scorer::{load_safetensors, SpeechEncoder};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Conv1d, Conv1dConfig, GroupNorm, Init, LayerNorm, Linear, VarBuilder};
use serde::Deserialize;
use std::path::Path;

const NORMALIZE_EPS: f64 = 1e-7;

fn default_hidden_size() -> usize {
    768
}
fn default_num_hidden_layers() -> usize {
    12
}
fn default_num_attention_heads() -> usize {
    12
}
fn default_intermediate_size() -> usize {
    3072
}
fn default_conv_dim() -> Vec<usize> {
    vec![512; 7]
}
fn default_conv_kernel() -> Vec<usize> {
    vec![10, 3, 3, 3, 3, 2, 2]
}
fn default_conv_stride() -> Vec<usize> {
    vec![5, 2, 2, 2, 2, 2, 2]
}
fn default_num_conv_pos_embeddings() -> usize {
    128
}
fn default_num_conv_pos_embedding_groups() -> usize {
    16
}
fn default_layer_norm_eps() -> f64 {
    1e-5
}
fn default_feat_extract_norm() -> String {
    "group".to_string()
}

/// Subset of the HuggingFace `Wav2Vec2Config` the encoder needs
#[derive(Debug, Clone, Deserialize)]
pub struct Wav2Vec2Config {
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_num_hidden_layers")]
    pub num_hidden_layers: usize,
    #[serde(default = "default_num_attention_heads")]
    pub num_attention_heads: usize,
    #[serde(default = "default_intermediate_size")]
    pub intermediate_size: usize,
    #[serde(default = "default_conv_dim")]
    pub conv_dim: Vec<usize>,
    #[serde(default = "default_conv_kernel")]
    pub conv_kernel: Vec<usize>,
    #[serde(default = "default_conv_stride")]
    pub conv_stride: Vec<usize>,
    #[serde(default)]
    pub conv_bias: bool,
    #[serde(default = "default_num_conv_pos_embeddings")]
    pub num_conv_pos_embeddings: usize,
    #[serde(default = "default_num_conv_pos_embedding_groups")]
    pub num_conv_pos_embedding_groups: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default = "default_feat_extract_norm")]
    pub feat_extract_norm: String,
    #[serde(default)]
    pub do_stable_layer_norm: bool,
}

impl Wav2Vec2Config {
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let bytes = std::fs::read(path).map_err(|source| ModelLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&bytes)
            .map_err(|e| ModelLoadError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject layouts this encoder does not implement
    pub fn validate(&self) -> Result<(), ModelLoadError> {
        let layers = self.conv_dim.len();
        if layers == 0 || self.conv_kernel.len() != layers || self.conv_stride.len() != layers {
            return Err(ModelLoadError::Config(format!(
                "conv_dim, conv_kernel and conv_stride must have the same non-zero length \
                 (got {}, {}, {})",
                layers,
                self.conv_kernel.len(),
                self.conv_stride.len()
            )));
        }
        if self.conv_kernel.iter().chain(&self.conv_stride).any(|&v| v == 0) {
            return Err(ModelLoadError::Config("conv kernels and strides must be positive".to_string()));
        }
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(ModelLoadError::Config(format!(
                "hidden_size {} is not divisible by {} attention heads",
                self.hidden_size, self.num_attention_heads
            )));
        }
        if self.num_conv_pos_embedding_groups == 0
            || self.hidden_size % self.num_conv_pos_embedding_groups != 0
        {
            return Err(ModelLoadError::Config(format!(
                "hidden_size {} is not divisible by {} positional conv groups",
                self.hidden_size, self.num_conv_pos_embedding_groups
            )));
        }
        if self.feat_extract_norm != "group" || self.do_stable_layer_norm {
            return Err(ModelLoadError::Config(format!(
                "unsupported layout: feat_extract_norm={}, do_stable_layer_norm={}",
                self.feat_extract_norm, self.do_stable_layer_norm
            )));
        }
        Ok(())
    }

    /// Input samples covered by one output frame of the feature encoder
    pub fn receptive_field(&self) -> usize {
        self.conv_kernel
            .iter()
            .zip(&self.conv_stride)
            .rev()
            .fold(1, |field, (&kernel, &stride)| (field - 1) * stride + kernel)
    }
}

// ============================================================================
// Feature encoder
// ============================================================================

struct ConvLayer {
    conv: Conv1d,
    norm: Option<GroupNorm>,
}

impl ConvLayer {
    fn new(config: &Wav2Vec2Config, index: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let in_dim = if index == 0 { 1 } else { config.conv_dim[index - 1] };
        let out_dim = config.conv_dim[index];
        let conv_config = Conv1dConfig {
            stride: config.conv_stride[index],
            ..Default::default()
        };
        let kernel = config.conv_kernel[index];
        let conv = if config.conv_bias {
            candle_nn::conv1d(in_dim, out_dim, kernel, conv_config, vb.pp("conv"))?
        } else {
            candle_nn::conv1d_no_bias(in_dim, out_dim, kernel, conv_config, vb.pp("conv"))?
        };
        // Group norm with one group per channel, first layer only
        let norm = if index == 0 {
            Some(candle_nn::group_norm(out_dim, out_dim, 1e-5, vb.pp("layer_norm"))?)
        } else {
            None
        };
        Ok(Self { conv, norm })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut xs = self.conv.forward(xs)?;
        if let Some(norm) = &self.norm {
            xs = norm.forward(&xs)?;
        }
        xs.gelu_erf()
    }
}

struct FeatureProjection {
    layer_norm: LayerNorm,
    projection: Linear,
}

impl FeatureProjection {
    fn new(config: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let in_dim = config.conv_dim[config.conv_dim.len() - 1];
        Ok(Self {
            layer_norm: candle_nn::layer_norm(in_dim, config.layer_norm_eps, vb.pp("layer_norm"))?,
            projection: candle_nn::linear(in_dim, config.hidden_size, vb.pp("projection"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.projection.forward(&self.layer_norm.forward(xs)?)
    }
}

/// Grouped convolution over time with weight normalization along the kernel
struct PositionalConvEmbedding {
    conv: Conv1d,
    trim_last: bool,
}

impl PositionalConvEmbedding {
    fn new(config: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let hidden = config.hidden_size;
        let kernel = config.num_conv_pos_embeddings;
        let groups = config.num_conv_pos_embedding_groups;
        let vb = vb.pp("conv");

        // Older checkpoints store weight_g/weight_v, newer ones the
        // parametrization originals
        let (g_name, v_name) = if vb.contains_tensor("weight_g") {
            ("weight_g", "weight_v")
        } else {
            (
                "parametrizations.weight.original0",
                "parametrizations.weight.original1",
            )
        };
        let g = vb.get_with_hints((1, 1, kernel), g_name, Init::Const(1.0))?;
        let v = vb.get_with_hints(
            (hidden, hidden / groups, kernel),
            v_name,
            candle_nn::init::DEFAULT_KAIMING_NORMAL,
        )?;
        let bias = vb.get_with_hints(hidden, "bias", Init::Const(0.0))?;

        let norm = v.sqr()?.sum_keepdim(0)?.sum_keepdim(1)?.sqrt()?;
        let weight = v.broadcast_mul(&g.broadcast_div(&norm)?)?;

        let conv_config = Conv1dConfig {
            padding: kernel / 2,
            groups,
            ..Default::default()
        };
        Ok(Self {
            conv: Conv1d::new(weight, Some(bias), conv_config),
            trim_last: kernel % 2 == 0,
        })
    }

    /// (batch, time, hidden) → positional term of the same shape
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.conv.forward(&xs.transpose(1, 2)?.contiguous()?)?;
        let xs = if self.trim_last {
            let time = xs.dim(2)?;
            xs.narrow(2, 0, time - 1)?
        } else {
            xs
        };
        xs.gelu_erf()?.transpose(1, 2)
    }
}

// ============================================================================
// Transformer
// ============================================================================

struct SelfAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
    head_dim: usize,
    scaling: f64,
}

impl SelfAttention {
    fn new(config: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let hidden = config.hidden_size;
        let head_dim = hidden / config.num_attention_heads;
        Ok(Self {
            q_proj: candle_nn::linear(hidden, hidden, vb.pp("q_proj"))?,
            k_proj: candle_nn::linear(hidden, hidden, vb.pp("k_proj"))?,
            v_proj: candle_nn::linear(hidden, hidden, vb.pp("v_proj"))?,
            out_proj: candle_nn::linear(hidden, hidden, vb.pp("out_proj"))?,
            num_heads: config.num_attention_heads,
            head_dim,
            scaling: (head_dim as f64).powf(-0.5),
        })
    }

    fn split_heads(&self, xs: &Tensor, batch: usize, time: usize) -> candle_core::Result<Tensor> {
        xs.reshape((batch, time, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (batch, time, hidden) = xs.dims3()?;

        let q = self.split_heads(&(self.q_proj.forward(xs)? * self.scaling)?, batch, time)?;
        let k = self.split_heads(&self.k_proj.forward(xs)?, batch, time)?;
        let v = self.split_heads(&self.v_proj.forward(xs)?, batch, time)?;

        let weights = q.matmul(&k.transpose(2, 3)?.contiguous()?)?;
        let weights = candle_nn::ops::softmax_last_dim(&weights)?;
        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, time, hidden))?;

        self.out_proj.forward(&context)
    }
}

struct FeedForward {
    intermediate_dense: Linear,
    output_dense: Linear,
}

impl FeedForward {
    fn new(config: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            intermediate_dense: candle_nn::linear(
                config.hidden_size,
                config.intermediate_size,
                vb.pp("intermediate_dense"),
            )?,
            output_dense: candle_nn::linear(
                config.intermediate_size,
                config.hidden_size,
                vb.pp("output_dense"),
            )?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.output_dense
            .forward(&self.intermediate_dense.forward(xs)?.gelu_erf()?)
    }
}

struct EncoderLayer {
    attention: SelfAttention,
    layer_norm: LayerNorm,
    feed_forward: FeedForward,
    final_layer_norm: LayerNorm,
}

impl EncoderLayer {
    fn new(config: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let hidden = config.hidden_size;
        let eps = config.layer_norm_eps;
        Ok(Self {
            attention: SelfAttention::new(config, vb.pp("attention"))?,
            layer_norm: candle_nn::layer_norm(hidden, eps, vb.pp("layer_norm"))?,
            feed_forward: FeedForward::new(config, vb.pp("feed_forward"))?,
            final_layer_norm: candle_nn::layer_norm(hidden, eps, vb.pp("final_layer_norm"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.layer_norm.forward(&(xs + self.attention.forward(xs)?)?)?;
        self.final_layer_norm
            .forward(&(&xs + self.feed_forward.forward(&xs)?)?)
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// Frozen wav2vec2 encoder producing mean-pooled embeddings
pub struct Wav2Vec2Encoder {
    config: Wav2Vec2Config,
    conv_layers: Vec<ConvLayer>,
    feature_projection: FeatureProjection,
    pos_conv_embed: PositionalConvEmbedding,
    encoder_layer_norm: LayerNorm,
    layers: Vec<EncoderLayer>,
    device: Device,
}

impl Wav2Vec2Encoder {
    /// Build from a var builder rooted at the model (no `wav2vec2.` prefix)
    pub fn new(config: Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        config
            .validate()
            .map_err(|e| candle_core::Error::Msg(e.to_string()))?;

        let conv_layers = (0..config.conv_dim.len())
            .map(|i| ConvLayer::new(&config, i, vb.pp(format!("feature_extractor.conv_layers.{}", i))))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let feature_projection = FeatureProjection::new(&config, vb.pp("feature_projection"))?;

        let encoder_vb = vb.pp("encoder");
        let pos_conv_embed = PositionalConvEmbedding::new(&config, encoder_vb.pp("pos_conv_embed"))?;
        let encoder_layer_norm = candle_nn::layer_norm(
            config.hidden_size,
            config.layer_norm_eps,
            encoder_vb.pp("layer_norm"),
        )?;
        let layers = (0..config.num_hidden_layers)
            .map(|i| EncoderLayer::new(&config, encoder_vb.pp(format!("layers.{}", i))))
            .collect::<candle_core::Result<Vec<_>>>()?;

        Ok(Self {
            device: vb.device().clone(),
            config,
            conv_layers,
            feature_projection,
            pos_conv_embed,
            encoder_layer_norm,
            layers,
        })
    }

    /// Load config and weights from disk
    ///
    /// `prefix` selects the model root inside the checkpoint, e.g. `wav2vec2`
    /// for weights exported from a task head.
    pub fn load(
        config_path: &Path,
        weights_path: &Path,
        prefix: Option<&str>,
    ) -> Result<Self, ModelLoadError> {
        let config = Wav2Vec2Config::from_file(config_path)?;
        let vb = load_safetensors(weights_path)?;
        let vb = match prefix {
            Some(prefix) if !prefix.is_empty() => vb.pp(prefix),
            _ => vb,
        };

        let encoder = Self::new(config, vb)?;
        tracing::info!(
            weights = %weights_path.display(),
            hidden_size = encoder.config.hidden_size,
            layers = encoder.config.num_hidden_layers,
            receptive_field = encoder.config.receptive_field(),
            "Speech encoder loaded"
        );
        Ok(encoder)
    }

    pub fn config(&self) -> &Wav2Vec2Config {
        &self.config
    }

    /// Raw samples (batch, samples) → last hidden state (batch, frames, hidden)
    pub fn forward(&self, input: &Tensor) -> candle_core::Result<Tensor> {
        let mut xs = input.unsqueeze(1)?;
        for layer in &self.conv_layers {
            xs = layer.forward(&xs)?;
        }
        let xs = self.feature_projection.forward(&xs.transpose(1, 2)?.contiguous()?)?;

        let xs = (&xs + self.pos_conv_embed.forward(&xs)?)?;
        let mut xs = self.encoder_layer_norm.forward(&xs)?;
        for layer in &self.layers {
            xs = layer.forward(&xs)?;
        }
        Ok(xs)
    }
}

/// Zero-mean, unit-variance copy of the samples
fn normalize(samples: &[f32]) -> Vec<f32> {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let variance = samples.iter().map(|&s| (s as f64 - mean).powi(2)).sum::<f64>() / n;
    let scale = 1.0 / (variance + NORMALIZE_EPS).sqrt();
    samples
        .iter()
        .map(|&s| ((s as f64 - mean) * scale) as f32)
        .collect()
}

impl SpeechEncoder for Wav2Vec2Encoder {
    fn embed(&self, waveform: &Waveform) -> Result<Embedding, InferenceError> {
        let min_samples = self.min_samples();
        if waveform.len() < min_samples {
            return Err(InferenceError::AudioTooShort {
                min_samples,
                got_samples: waveform.len(),
            });
        }

        let samples = normalize(waveform.samples());
        let input = Tensor::from_vec(samples, (1, waveform.len()), &self.device)?;
        let hidden = self.forward(&input)?;
        let pooled = hidden.mean(1)?.squeeze(0)?.to_dtype(DType::F32)?;
        let values = pooled.to_vec1::<f32>()?;

        if values.len() != self.config.hidden_size {
            return Err(InferenceError::DimensionMismatch {
                expected: self.config.hidden_size,
                got: values.len(),
            });
        }

        tracing::debug!(
            frames = hidden.dim(1)?,
            dimension = values.len(),
            "Waveform embedded"
        );
        Ok(Embedding::new(values))
    }

    fn dimension(&self) -> usize {
        self.config.hidden_size
    }

    fn min_samples(&self) -> usize {
        self.config.receptive_field()
    }
}
