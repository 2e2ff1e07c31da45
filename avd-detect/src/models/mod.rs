//! Data models flowing through the detection pipeline
//!
//! Every entity is produced by exactly one stage and never mutated
//! afterwards.

pub mod audio;
pub mod features;
pub mod verdict;

pub use audio::{AudioFormat, EncodedAudio, Waveform, TARGET_SAMPLE_RATE};
pub use features::{Embedding, FeatureSet, MFCC_COUNT};
pub use verdict::{ClassificationResult, RuleId, ScoreComponents, TriggeredRule};
