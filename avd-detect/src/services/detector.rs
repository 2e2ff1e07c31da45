//! Detection pipeline handle
//!
//! Built once at startup and shared as `Arc<VoiceDetector>`. Every stage is
//! immutable after construction, so concurrent requests need no locking.
//!
//! **Flow:** decode → features → model score → heuristic score → aggregate

use crate::error::{DetectionError, ModelLoadError};
use crate::models::{AudioFormat, ClassificationResult, ScoreComponents, Waveform};
use crate::services::{
    Aggregator, AudioDecoder, EmbeddingScorer, FeatureExtractor, HeuristicScorer, ScorerHead,
    SpeechEncoder, Wav2Vec2Encoder,
};
use avd_common::api::{Language, VoiceDetectionRequest};
use avd_common::config::ModelPaths;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub struct VoiceDetector {
    decoder: AudioDecoder,
    extractor: FeatureExtractor,
    scorer: EmbeddingScorer,
    heuristics: HeuristicScorer,
    aggregator: Aggregator,
}

impl VoiceDetector {
    /// Assemble a detector around an encoder and scorer head, with default
    /// feature extraction, rules and weights
    pub fn new(encoder: Arc<dyn SpeechEncoder>, head: ScorerHead) -> Result<Self, ModelLoadError> {
        Ok(Self {
            decoder: AudioDecoder::new(),
            extractor: FeatureExtractor::default(),
            scorer: EmbeddingScorer::new(encoder, head)?,
            heuristics: HeuristicScorer::default(),
            aggregator: Aggregator::default(),
        })
    }

    /// Load the speech encoder and scorer head from disk
    pub fn load(
        paths: &ModelPaths,
        scorer_hidden: &[usize],
        weight_prefix: Option<&str>,
    ) -> Result<Self, ModelLoadError> {
        let started = Instant::now();
        let encoder = Wav2Vec2Encoder::load(&paths.encoder_config, &paths.encoder_weights, weight_prefix)?;
        let head = ScorerHead::load(&paths.scorer_weights, encoder.dimension(), scorer_hidden)?;
        let detector = Self::new(Arc::new(encoder), head)?;

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            min_samples = detector.scorer.min_samples(),
            "Voice detector ready"
        );
        Ok(detector)
    }

    /// Shortest decoded waveform the embedding model accepts
    pub fn min_samples(&self) -> usize {
        self.scorer.min_samples()
    }

    /// Classify one request end to end
    pub fn classify(
        &self,
        request: &VoiceDetectionRequest,
    ) -> Result<ClassificationResult, DetectionError> {
        let span = tracing::info_span!(
            "detection",
            request_id = %Uuid::new_v4(),
            language = %request.language
        );
        let _enter = span.enter();
        let started = Instant::now();

        let format: AudioFormat = request.audio_format.parse()?;
        let waveform = self.decoder.decode_base64(&request.audio_base64, format)?;
        tracing::debug!(
            samples = waveform.len(),
            duration_seconds = format!("{:.2}", waveform.duration_seconds()),
            "Audio decoded"
        );

        let result = self.analyze(&waveform, request.language)?;

        tracing::info!(
            classification = result.label.as_str(),
            confidence = format!("{:.3}", result.confidence),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Detection complete"
        );
        Ok(result)
    }

    /// Classify an already decoded waveform
    pub fn analyze(
        &self,
        waveform: &Waveform,
        language: Language,
    ) -> Result<ClassificationResult, DetectionError> {
        let features = self.extractor.extract(waveform);
        let model_score = self.scorer.score(waveform)?;
        let heuristic = self.heuristics.score(&features);

        let scores = ScoreComponents {
            model_score,
            heuristic_score: heuristic.score,
            triggered_rules: heuristic.triggered,
        };
        Ok(self.aggregator.aggregate(scores, features, language))
    }
}
