//! Rule-based scoring over acoustic features
//!
//! An ordered rule table replaces nested threshold branches. Base rules
//! (pitch bands) are mutually exclusive: the first match sets the base score.
//! Adjustment rules fire independently and add their weight. The total is
//! clamped to [0, 1].
//!
//! Thresholds never depend on the spoken language.

use crate::models::{FeatureSet, RuleId, TriggeredRule};

/// Score when no base rule matches (unvoiced input)
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Condition evaluated against a feature set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate {
    /// Voiced and `min <= pitch_mean_hz < max`
    PitchBand { min: f64, max: f64 },
    /// Centroid std / mean below the limit over at least two active frames
    CentroidVariationBelow(f64),
    /// Mean spread of MFCC c1..c12 below the limit (dB)
    MfccSpreadBelow(f64),
    /// Zero-crossing rate std below the limit
    ZeroCrossingStdBelow(f64),
}

impl Predicate {
    fn matches(&self, features: &FeatureSet) -> bool {
        // Spreads over fewer than two frames are meaningless
        let has_spread = features.active_frame_count >= 2;
        match *self {
            Predicate::PitchBand { min, max } => {
                features.voiced && features.pitch_mean_hz >= min && features.pitch_mean_hz < max
            }
            Predicate::CentroidVariationBelow(limit) => {
                has_spread && features.centroid_variation() < limit
            }
            Predicate::MfccSpreadBelow(limit) => has_spread && features.mfcc_spread() < limit,
            Predicate::ZeroCrossingStdBelow(limit) => {
                has_spread && features.zero_crossing_rate_std < limit
            }
        }
    }
}

/// What a matching rule does to the score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Sets the base score; only the first matching base rule applies
    Base(f64),
    /// Added to the base score
    Adjust(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub id: RuleId,
    pub predicate: Predicate,
    pub effect: Effect,
}

/// Default rule table, in evaluation order
///
/// Adjustments sum to at most 0.04, so a fully flat signal in the lowest
/// pitch band scores 0.89 and fuses to about 0.85 against a neutral model.
pub const DEFAULT_RULES: [Rule; 7] = [
    Rule {
        id: RuleId::PitchVeryLow,
        predicate: Predicate::PitchBand { min: 0.0, max: 60.0 },
        effect: Effect::Base(0.85),
    },
    Rule {
        id: RuleId::PitchLow,
        predicate: Predicate::PitchBand { min: 60.0, max: 85.0 },
        effect: Effect::Base(0.70),
    },
    Rule {
        id: RuleId::PitchBorderline,
        predicate: Predicate::PitchBand { min: 85.0, max: 100.0 },
        effect: Effect::Base(0.55),
    },
    Rule {
        id: RuleId::PitchNatural,
        predicate: Predicate::PitchBand {
            min: 100.0,
            max: f64::INFINITY,
        },
        effect: Effect::Base(0.25),
    },
    Rule {
        id: RuleId::NarrowSpectralCentroid,
        predicate: Predicate::CentroidVariationBelow(0.05),
        effect: Effect::Adjust(0.015),
    },
    Rule {
        id: RuleId::FlatMfcc,
        predicate: Predicate::MfccSpreadBelow(3.0),
        effect: Effect::Adjust(0.015),
    },
    Rule {
        id: RuleId::FlatZeroCrossing,
        predicate: Predicate::ZeroCrossingStdBelow(0.005),
        effect: Effect::Adjust(0.01),
    },
];

/// Outcome of evaluating the rule table
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicOutcome {
    /// Clamped score in [0, 1]
    pub score: f64,
    /// Rules that fired, in table order
    pub triggered: Vec<TriggeredRule>,
}

/// Evaluates an ordered rule table; never fails
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    rules: Vec<Rule>,
}

impl HeuristicScorer {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn score(&self, features: &FeatureSet) -> HeuristicOutcome {
        let mut base: Option<f64> = None;
        let mut adjustment = 0.0;
        let mut triggered = Vec::new();

        for rule in &self.rules {
            match rule.effect {
                Effect::Base(value) => {
                    if base.is_none() && rule.predicate.matches(features) {
                        base = Some(value);
                        triggered.push(TriggeredRule {
                            id: rule.id,
                            contribution: value,
                        });
                    }
                }
                Effect::Adjust(weight) => {
                    if rule.predicate.matches(features) {
                        adjustment += weight;
                        triggered.push(TriggeredRule {
                            id: rule.id,
                            contribution: weight,
                        });
                    }
                }
            }
        }

        // Unvoiced input carries no evidence either way
        let score = match base {
            Some(base) => (base + adjustment).clamp(0.0, 1.0),
            None => {
                triggered.clear();
                NEUTRAL_SCORE
            }
        };

        tracing::debug!(
            score = format!("{:.3}", score),
            rules = ?triggered.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            "Heuristic score"
        );

        HeuristicOutcome { score, triggered }
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::features::fixtures::voiced;

    fn ids(outcome: &HeuristicOutcome) -> Vec<RuleId> {
        outcome.triggered.iter().map(|r| r.id).collect()
    }

    #[test]
    fn pitch_bands_set_base_score() {
        let scorer = HeuristicScorer::default();
        let cases = [
            (46.0, 0.85, RuleId::PitchVeryLow),
            (72.0, 0.70, RuleId::PitchLow),
            (92.0, 0.55, RuleId::PitchBorderline),
            (180.0, 0.25, RuleId::PitchNatural),
        ];
        for (pitch, expected, id) in cases {
            let outcome = scorer.score(&voiced(pitch));
            assert!((outcome.score - expected).abs() < 1e-12, "pitch {}", pitch);
            assert_eq!(ids(&outcome), vec![id]);
        }
    }

    #[test]
    fn band_edges_belong_to_upper_band() {
        let scorer = HeuristicScorer::default();
        assert_eq!(ids(&scorer.score(&voiced(59.0))), vec![RuleId::PitchVeryLow]);
        assert_eq!(ids(&scorer.score(&voiced(60.0))), vec![RuleId::PitchLow]);
        assert_eq!(ids(&scorer.score(&voiced(61.0))), vec![RuleId::PitchLow]);
        assert_eq!(ids(&scorer.score(&voiced(100.0))), vec![RuleId::PitchNatural]);
    }

    #[test]
    fn adjustments_add_and_stack() {
        let mut features = voiced(46.0);
        features.spectral_centroid_std_hz = 20.0;
        features.mfcc_std = [1.0; 13];
        features.zero_crossing_rate_std = 0.001;

        let outcome = HeuristicScorer::default().score(&features);
        assert!((outcome.score - 0.89).abs() < 1e-12);
        assert_eq!(
            ids(&outcome),
            vec![
                RuleId::PitchVeryLow,
                RuleId::NarrowSpectralCentroid,
                RuleId::FlatMfcc,
                RuleId::FlatZeroCrossing,
            ]
        );
        assert_eq!(outcome.triggered[2].contribution, 0.015);
    }

    #[test]
    fn unvoiced_is_neutral() {
        let mut features = voiced(0.0);
        features.voiced = false;
        features.mfcc_std = [0.5; 13];

        let outcome = HeuristicScorer::default().score(&features);
        assert_eq!(outcome.score, NEUTRAL_SCORE);
        assert!(outcome.triggered.is_empty());
    }

    #[test]
    fn spreads_need_two_active_frames() {
        let mut features = voiced(150.0);
        features.active_frame_count = 1;
        features.spectral_centroid_std_hz = 0.0;
        features.mfcc_std = [0.0; 13];
        features.zero_crossing_rate_std = 0.0;

        let outcome = HeuristicScorer::default().score(&features);
        assert_eq!(ids(&outcome), vec![RuleId::PitchNatural]);
    }

    #[test]
    fn score_is_clamped() {
        let rules = vec![
            Rule {
                id: RuleId::PitchVeryLow,
                predicate: Predicate::PitchBand { min: 0.0, max: 60.0 },
                effect: Effect::Base(0.95),
            },
            Rule {
                id: RuleId::FlatMfcc,
                predicate: Predicate::MfccSpreadBelow(100.0),
                effect: Effect::Adjust(0.2),
            },
        ];
        let outcome = HeuristicScorer::new(rules).score(&voiced(50.0));
        assert_eq!(outcome.score, 1.0);
    }
}
