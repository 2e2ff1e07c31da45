//! Scoring pipeline scenarios
//!
//! Exercise heuristic scoring and aggregation on hand-built feature sets, and
//! the decode → analyze path on synthesized audio.

use std::sync::Arc;

use avd_common::api::{Classification, Language, VoiceDetectionRequest};
use avd_detect::error::{DecodeError, DetectionError, InferenceError};
use avd_detect::models::{
    AudioFormat, EncodedAudio, Embedding, FeatureSet, RuleId, ScoreComponents, Waveform,
    TARGET_SAMPLE_RATE,
};
use avd_detect::services::{
    Aggregator, AudioDecoder, FeatureExtractor, HeuristicScorer, ScorerHead, SpeechEncoder,
};
use avd_detect::VoiceDetector;
use candle_core::{DType, Device};
use candle_nn::VarBuilder;

/// Model score produced by an all-zero scorer head
const NEUTRAL_MODEL_SCORE: f64 = 0.5;

struct StubEncoder;

impl SpeechEncoder for StubEncoder {
    fn embed(&self, _waveform: &Waveform) -> Result<Embedding, InferenceError> {
        Ok(Embedding::new(vec![1.0; 8]))
    }

    fn dimension(&self) -> usize {
        8
    }

    fn min_samples(&self) -> usize {
        400
    }
}

fn detector() -> VoiceDetector {
    let head = ScorerHead::new(8, &[4], VarBuilder::zeros(DType::F32, &Device::Cpu)).unwrap();
    VoiceDetector::new(Arc::new(StubEncoder), head).unwrap()
}

fn features(pitch_mean_hz: f64, centroid_hz: f64, mfcc_spread: f64) -> FeatureSet {
    FeatureSet {
        pitch_mean_hz,
        pitch_variance_hz: 225.0,
        voiced: true,
        spectral_centroid_hz: centroid_hz,
        spectral_centroid_std_hz: centroid_hz * 0.2,
        zero_crossing_rate: 0.08,
        zero_crossing_rate_std: 0.02,
        mfcc: [0.0; 13],
        mfcc_std: [mfcc_spread; 13],
        frame_count: 150,
        active_frame_count: 140,
        voiced_frame_count: 120,
    }
}

fn verdict(features: FeatureSet, language: Language) -> avd_detect::models::ClassificationResult {
    let heuristic = HeuristicScorer::default().score(&features);
    let scores = ScoreComponents {
        model_score: NEUTRAL_MODEL_SCORE,
        heuristic_score: heuristic.score,
        triggered_rules: heuristic.triggered,
    };
    Aggregator::default().aggregate(scores, features, language)
}

fn tone(freq: f64, seconds: f64) -> Waveform {
    let len = (seconds * TARGET_SAMPLE_RATE as f64) as usize;
    let samples = (0..len)
        .map(|i| {
            (2.0 * std::f64::consts::PI * freq * i as f64 / TARGET_SAMPLE_RATE as f64).sin() as f32
                * 0.4
        })
        .collect();
    Waveform::new(samples, TARGET_SAMPLE_RATE).unwrap()
}

#[test]
fn steady_low_tone_is_ai_generated() {
    let result = detector().analyze(&tone(46.0, 2.0), Language::English).unwrap();

    assert_eq!(result.label, Classification::AiGenerated);
    assert_eq!(result.scores.model_score, NEUTRAL_MODEL_SCORE);
    assert!((result.confidence - 0.85).abs() < 0.03, "confidence {}", result.confidence);
    assert!(result.explanation.contains("46.0 Hz"), "{}", result.explanation);

    let rules: Vec<RuleId> = result.scores.triggered_rules.iter().map(|r| r.id).collect();
    assert_eq!(rules[0], RuleId::PitchVeryLow);
    assert!(rules.contains(&RuleId::FlatMfcc), "{:?}", rules);
}

#[test]
fn measured_centroid_is_quoted() {
    let result = verdict(features(46.0, 2399.0, 2.0), Language::English);

    assert_eq!(result.label, Classification::AiGenerated);
    assert!(result.explanation.contains("46.0 Hz"), "{}", result.explanation);
    assert!(result.explanation.contains("2399 Hz"), "{}", result.explanation);
}

#[test]
fn natural_pitch_is_human() {
    let result = verdict(features(150.0, 1800.0, 8.0), Language::Hindi);

    assert_eq!(result.label, Classification::Human);
    assert!(result.confidence >= 0.15 && result.confidence <= 0.45);
    assert_eq!(result.language, Language::Hindi);
}

#[test]
fn pitch_threshold_boundary() {
    let below = verdict(features(59.0, 2000.0, 8.0), Language::Tamil);
    let above = verdict(features(61.0, 2000.0, 8.0), Language::Tamil);

    assert!((below.scores.heuristic_score - 0.85).abs() < 1e-12);
    assert!((above.scores.heuristic_score - 0.70).abs() < 1e-12);
    assert!(below.confidence > above.confidence);
}

#[test]
fn decision_threshold_boundary() {
    let aggregator = Aggregator::default();
    assert_eq!(aggregator.label_for(0.50), Classification::Human);
    assert_eq!(aggregator.label_for(0.500_000_1), Classification::AiGenerated);
}

#[test]
fn language_never_changes_the_verdict() {
    let reference = verdict(features(72.0, 2100.0, 4.0), Language::English);
    for language in Language::ALL {
        let result = verdict(features(72.0, 2100.0, 4.0), language);
        assert_eq!(result.label, reference.label);
        assert_eq!(result.confidence, reference.confidence);
        assert_eq!(result.explanation, reference.explanation);
        assert_eq!(result.language, language);
    }
}

#[test]
fn scores_stay_in_unit_range() {
    for pitch in [0.0, 45.0, 60.0, 84.9, 99.9, 100.0, 480.0] {
        for spread in [0.0, 2.9, 3.0, 12.0] {
            let result = verdict(features(pitch, 2000.0, spread), Language::Telugu);
            assert!((0.0..=1.0).contains(&result.scores.heuristic_score));
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }
}

#[test]
fn empty_payload_is_decode_error() {
    let err = AudioDecoder::new()
        .decode(EncodedAudio::new(Vec::new(), AudioFormat::Mp3))
        .unwrap_err();
    assert!(matches!(err, DecodeError::EmptyPayload));

    let request = VoiceDetectionRequest {
        language: Language::English,
        audio_format: "mp3".to_string(),
        audio_base64: String::new(),
    };
    assert!(matches!(
        detector().classify(&request),
        Err(DetectionError::Decode(DecodeError::EmptyPayload))
    ));
}

#[test]
fn waveform_below_receptive_field_is_inference_error() {
    let short = tone(200.0, 0.01);
    assert_eq!(short.len(), 160);
    assert!(matches!(
        detector().analyze(&short, Language::English),
        Err(DetectionError::Inference(InferenceError::AudioTooShort {
            min_samples: 400,
            got_samples: 160
        }))
    ));
}

#[test]
fn feature_extraction_is_deterministic() {
    let extractor = FeatureExtractor::default();
    let waveform = tone(130.0, 1.0);
    let first = extractor.extract(&waveform);
    let second = extractor.extract(&waveform);
    assert_eq!(first, second);
    assert!(first.is_finite());
}

#[test]
fn analyze_is_idempotent() {
    let detector = detector();
    let waveform = tone(95.0, 1.5);
    let first = detector.analyze(&waveform, Language::Malayalam).unwrap();
    let second = detector.analyze(&waveform, Language::Malayalam).unwrap();
    assert_eq!(first, second);
}
