//! Pipeline stages
//!
//! AudioDecoder → FeatureExtractor / EmbeddingScorer / HeuristicScorer →
//! Aggregator, tied together by [`VoiceDetector`].

pub mod aggregator;
pub mod audio_decoder;
pub mod detector;
pub mod embedding_scorer;
pub mod feature_extractor;
pub mod heuristic_scorer;
pub mod wav2vec2;

pub use aggregator::Aggregator;
pub use audio_decoder::AudioDecoder;
pub use detector::VoiceDetector;
pub use embedding_scorer::{EmbeddingScorer, ScorerHead, SpeechEncoder};
pub use feature_extractor::{FeatureExtractor, FeatureExtractorConfig};
pub use heuristic_scorer::{HeuristicOutcome, HeuristicScorer, Rule};
pub use wav2vec2::{Wav2Vec2Config, Wav2Vec2Encoder};
