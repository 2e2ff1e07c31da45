//! Scores, triggered rules and the final verdict

use avd_common::api::{Classification, Language};
use std::fmt;

use super::FeatureSet;

/// Identifier of a heuristic rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    PitchVeryLow,
    PitchLow,
    PitchBorderline,
    PitchNatural,
    NarrowSpectralCentroid,
    FlatMfcc,
    FlatZeroCrossing,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::PitchVeryLow => "pitch_very_low",
            RuleId::PitchLow => "pitch_low",
            RuleId::PitchBorderline => "pitch_borderline",
            RuleId::PitchNatural => "pitch_natural",
            RuleId::NarrowSpectralCentroid => "narrow_spectral_centroid",
            RuleId::FlatMfcc => "flat_mfcc",
            RuleId::FlatZeroCrossing => "flat_zero_crossing",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule that fired and what it contributed to the heuristic score
///
/// Base rules contribute their absolute score, adjustment rules their
/// additive weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggeredRule {
    pub id: RuleId,
    pub contribution: f64,
}

/// Inputs to the aggregator
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreComponents {
    /// Learned score in [0, 1]
    pub model_score: f64,
    /// Rule-based score in [0, 1]
    pub heuristic_score: f64,
    /// Rules in table order
    pub triggered_rules: Vec<TriggeredRule>,
}

/// Terminal artifact of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: Classification,
    /// Combined score in [0, 1]
    pub confidence: f64,
    pub explanation: String,
    /// Echo of the request's language tag
    pub language: Language,
    pub scores: ScoreComponents,
    pub features: FeatureSet,
}
