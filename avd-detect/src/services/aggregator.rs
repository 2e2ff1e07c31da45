//! Score fusion, decision threshold and explanation
//!
//! `combined = 0.1 * model + 0.9 * heuristic`; the label is AI_GENERATED
//! strictly above 0.5. The explanation is templated from the triggered rules
//! and always quotes the measured values.

use crate::models::{ClassificationResult, FeatureSet, RuleId, ScoreComponents, TriggeredRule};
use avd_common::api::{Classification, Language};

/// Weight of the learned score
pub const MODEL_WEIGHT: f64 = 0.1;
/// Weight of the rule-based score
pub const HEURISTIC_WEIGHT: f64 = 0.9;
/// Combined scores strictly above this are AI_GENERATED
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Weighted fusion of the two scores; cannot fail
#[derive(Debug, Clone)]
pub struct Aggregator {
    model_weight: f64,
    heuristic_weight: f64,
    threshold: f64,
}

impl Aggregator {
    pub fn new(model_weight: f64, heuristic_weight: f64, threshold: f64) -> Self {
        Self {
            model_weight,
            heuristic_weight,
            threshold,
        }
    }

    /// Combined score in [0, 1]
    pub fn combine(&self, model_score: f64, heuristic_score: f64) -> f64 {
        (self.model_weight * model_score + self.heuristic_weight * heuristic_score).clamp(0.0, 1.0)
    }

    pub fn label_for(&self, combined: f64) -> Classification {
        if combined > self.threshold {
            Classification::AiGenerated
        } else {
            Classification::Human
        }
    }

    pub fn aggregate(
        &self,
        scores: ScoreComponents,
        features: FeatureSet,
        language: Language,
    ) -> ClassificationResult {
        let combined = self.combine(scores.model_score, scores.heuristic_score);
        let label = self.label_for(combined);
        let explanation = explain(label, combined, &scores, &features);

        tracing::debug!(
            model_score = format!("{:.3}", scores.model_score),
            heuristic_score = format!("{:.3}", scores.heuristic_score),
            combined = format!("{:.3}", combined),
            label = label.as_str(),
            "Scores aggregated"
        );

        ClassificationResult {
            label,
            confidence: combined,
            explanation,
            language,
            scores,
            features,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(MODEL_WEIGHT, HEURISTIC_WEIGHT, DECISION_THRESHOLD)
    }
}

/// Strength word for the likelihood of the winning side
fn strength(likelihood: f64) -> &'static str {
    if likelihood > 0.75 {
        "Strong"
    } else if likelihood > 0.55 {
        "Moderate"
    } else {
        "Slight"
    }
}

fn rule_phrase(rule: &TriggeredRule, features: &FeatureSet) -> String {
    match rule.id {
        RuleId::PitchVeryLow => format!(
            "unusually low mean pitch ({:.1} Hz)",
            features.pitch_mean_hz
        ),
        RuleId::PitchLow => format!("low mean pitch ({:.1} Hz)", features.pitch_mean_hz),
        RuleId::PitchBorderline => format!(
            "borderline mean pitch ({:.1} Hz)",
            features.pitch_mean_hz
        ),
        RuleId::PitchNatural => format!(
            "natural pitch range ({:.1} Hz, ±{:.1} Hz variation)",
            features.pitch_mean_hz,
            features.pitch_std_hz()
        ),
        RuleId::NarrowSpectralCentroid => format!(
            "narrow spectral centroid movement ({:.1}% variation)",
            features.centroid_variation() * 100.0
        ),
        RuleId::FlatMfcc => format!(
            "flat timbre (MFCC spread {:.2} dB)",
            features.mfcc_spread()
        ),
        RuleId::FlatZeroCrossing => format!(
            "uniform zero-crossing rate (std {:.4})",
            features.zero_crossing_rate_std
        ),
    }
}

fn explain(
    label: Classification,
    combined: f64,
    scores: &ScoreComponents,
    features: &FeatureSet,
) -> String {
    let (likelihood, side) = match label {
        Classification::AiGenerated => (combined, "synthetic speech"),
        Classification::Human => (1.0 - combined, "human speech"),
    };

    let evidence = if scores.triggered_rules.is_empty() {
        "no stable pitch detected".to_string()
    } else {
        scores
            .triggered_rules
            .iter()
            .map(|rule| rule_phrase(rule, features))
            .collect::<Vec<_>>()
            .join("; ")
    };

    format!(
        "{} indicators of {}: {}. Spectral centroid {:.0} Hz, zero-crossing rate {:.3}. \
         Model score {:.2}, heuristic score {:.2}, confidence {:.0}%.",
        strength(likelihood),
        side,
        evidence,
        features.spectral_centroid_hz,
        features.zero_crossing_rate,
        scores.model_score,
        scores.heuristic_score,
        combined * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::features::fixtures::voiced;

    fn components(model: f64, heuristic: f64, rules: &[(RuleId, f64)]) -> ScoreComponents {
        ScoreComponents {
            model_score: model,
            heuristic_score: heuristic,
            triggered_rules: rules
                .iter()
                .map(|&(id, contribution)| TriggeredRule { id, contribution })
                .collect(),
        }
    }

    #[test]
    fn weights_are_applied() {
        let aggregator = Aggregator::default();
        assert!((aggregator.combine(1.0, 0.0) - 0.1).abs() < 1e-12);
        assert!((aggregator.combine(0.0, 1.0) - 0.9).abs() < 1e-12);
        assert!((aggregator.combine(0.5, 0.9) - 0.86).abs() < 1e-12);
    }

    #[test]
    fn threshold_is_strict() {
        let aggregator = Aggregator::default();
        assert_eq!(aggregator.label_for(0.5), Classification::Human);
        assert_eq!(aggregator.label_for(0.500_000_1), Classification::AiGenerated);
        assert_eq!(aggregator.label_for(0.0), Classification::Human);
        assert_eq!(aggregator.label_for(1.0), Classification::AiGenerated);
    }

    #[test]
    fn ai_explanation_quotes_measurements() {
        let mut features = voiced(46.0);
        features.spectral_centroid_hz = 2399.4;
        let scores = components(
            0.5,
            0.865,
            &[(RuleId::PitchVeryLow, 0.85), (RuleId::FlatMfcc, 0.015)],
        );

        let result = Aggregator::default().aggregate(scores, features, Language::English);
        assert_eq!(result.label, Classification::AiGenerated);
        assert!(result.explanation.starts_with("Strong indicators of synthetic speech"));
        assert!(result.explanation.contains("46.0 Hz"));
        assert!(result.explanation.contains("2399 Hz"));
        assert!(result.explanation.contains("confidence 83%"));
        assert_eq!(result.language, Language::English);
    }

    #[test]
    fn human_explanation_uses_human_side_likelihood() {
        let scores = components(0.5, 0.25, &[(RuleId::PitchNatural, 0.25)]);
        let result = Aggregator::default().aggregate(scores, voiced(150.0), Language::Tamil);

        assert_eq!(result.label, Classification::Human);
        assert!((result.confidence - 0.275).abs() < 1e-12);
        // 1 - 0.275 = 0.725 on the human side
        assert!(result.explanation.starts_with("Moderate indicators of human speech"));
        assert!(result.explanation.contains("150.0 Hz, ±20.0 Hz variation"));
    }

    #[test]
    fn unvoiced_explanation_says_so() {
        let scores = components(0.5, 0.5, &[]);
        let result = Aggregator::default().aggregate(scores, voiced(0.0), Language::Hindi);
        assert_eq!(result.label, Classification::Human);
        assert!(result.explanation.starts_with("Slight indicators of human speech"));
        assert!(result.explanation.contains("no stable pitch detected"));
    }
}
