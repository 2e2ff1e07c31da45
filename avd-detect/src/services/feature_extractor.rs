//! Acoustic feature extraction
//!
//! Frames the waveform once and derives every descriptor from the same frame
//! sequence:
//! - pitch (YIN) mean and variance over voiced frames
//! - spectral centroid mean and spread over active frames
//! - zero-crossing rate mean and spread over all frames
//! - 13 MFCCs, mean and spread over active frames
//!
//! Extraction never fails for a non-empty waveform and is deterministic.

use crate::models::{FeatureSet, Waveform, MFCC_COUNT, TARGET_SAMPLE_RATE};
use crate::utils::spectral::{rms, zero_crossing_rate};
use crate::utils::{frames, mean_std, SpectralAnalyzer, YinEstimator};

// ============================================================================
// Configuration
// ============================================================================

/// Framing and detector parameters
#[derive(Debug, Clone)]
pub struct FeatureExtractorConfig {
    /// Analysis frame length in samples (default 2048)
    pub frame_length: usize,
    /// Frame advance in samples (default 512)
    pub hop_length: usize,
    /// Mel bands feeding the cepstrum (default 40)
    pub num_mels: usize,
    /// Lower bound of the pitch search (default 40 Hz)
    pub min_pitch_hz: f64,
    /// Upper bound of the pitch search (default 500 Hz)
    pub max_pitch_hz: f64,
    /// YIN dip threshold (default 0.15)
    pub yin_threshold: f64,
    /// Frames with RMS below this are silent (default 1e-3)
    pub silence_rms: f64,
    /// Fewer voiced frames than this yields the unvoiced marker (default 10)
    pub min_voiced_frames: usize,
}

impl Default for FeatureExtractorConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
            num_mels: 40,
            min_pitch_hz: 40.0,
            max_pitch_hz: 500.0,
            yin_threshold: 0.15,
            silence_rms: 1e-3,
            min_voiced_frames: 10,
        }
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Stateless feature extractor; FFT plan and filterbank are built once
pub struct FeatureExtractor {
    config: FeatureExtractorConfig,
    analyzer: SpectralAnalyzer,
    yin: YinEstimator,
}

impl FeatureExtractor {
    pub fn new(config: FeatureExtractorConfig) -> Self {
        let analyzer = SpectralAnalyzer::new(
            TARGET_SAMPLE_RATE,
            config.frame_length,
            config.num_mels,
            MFCC_COUNT,
        );
        let yin = YinEstimator::new(
            TARGET_SAMPLE_RATE,
            config.min_pitch_hz,
            config.max_pitch_hz,
            config.yin_threshold,
        );
        Self {
            config,
            analyzer,
            yin,
        }
    }

    pub fn config(&self) -> &FeatureExtractorConfig {
        &self.config
    }

    /// Compute the feature set of one waveform
    pub fn extract(&self, waveform: &Waveform) -> FeatureSet {
        if waveform.sample_rate() != TARGET_SAMPLE_RATE {
            tracing::warn!(
                sample_rate = waveform.sample_rate(),
                expected = TARGET_SAMPLE_RATE,
                "Waveform not at analysis rate; frequencies will be scaled"
            );
        }

        let frames = frames(
            waveform.samples(),
            self.config.frame_length,
            self.config.hop_length,
        );

        let mut zcr_track = Vec::with_capacity(frames.len());
        let mut centroid_track = Vec::new();
        let mut pitch_track = Vec::new();
        let mut mfcc_tracks: Vec<Vec<f64>> = vec![Vec::new(); MFCC_COUNT];
        let mut active_frames = 0usize;

        for frame in &frames {
            zcr_track.push(zero_crossing_rate(frame));

            if rms(frame) < self.config.silence_rms {
                continue;
            }
            active_frames += 1;

            let magnitudes = self.analyzer.magnitudes(frame);
            if let Some(centroid) = self.analyzer.centroid(&magnitudes) {
                centroid_track.push(centroid);
            }
            for (track, coeff) in mfcc_tracks.iter_mut().zip(self.analyzer.mfcc(&magnitudes)) {
                track.push(coeff);
            }
            if let Some(f0) = self.yin.estimate(frame) {
                pitch_track.push(f0);
            }
        }

        let voiced = pitch_track.len() >= self.config.min_voiced_frames;
        let (pitch_mean_hz, pitch_variance_hz) = if voiced {
            let (mean, std) = mean_std(&pitch_track);
            (mean, std * std)
        } else {
            (0.0, 0.0)
        };

        let (spectral_centroid_hz, spectral_centroid_std_hz) = mean_std(&centroid_track);
        let (zero_crossing_rate, zero_crossing_rate_std) = mean_std(&zcr_track);

        let mut mfcc = [0.0; MFCC_COUNT];
        let mut mfcc_std = [0.0; MFCC_COUNT];
        for (i, track) in mfcc_tracks.iter().enumerate() {
            let (mean, std) = mean_std(track);
            mfcc[i] = mean;
            mfcc_std[i] = std;
        }

        let features = FeatureSet {
            pitch_mean_hz,
            pitch_variance_hz,
            voiced,
            spectral_centroid_hz,
            spectral_centroid_std_hz,
            zero_crossing_rate,
            zero_crossing_rate_std,
            mfcc,
            mfcc_std,
            frame_count: frames.len(),
            active_frame_count: active_frames,
            voiced_frame_count: pitch_track.len(),
        };

        tracing::debug!(
            frames = features.frame_count,
            active = features.active_frame_count,
            voiced_frames = features.voiced_frame_count,
            pitch_mean_hz = format!("{:.1}", features.pitch_mean_hz),
            centroid_hz = format!("{:.0}", features.spectral_centroid_hz),
            zcr = format!("{:.4}", features.zero_crossing_rate),
            "Features extracted"
        );

        features
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureExtractorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, seconds: f64) -> Waveform {
        let len = (seconds * TARGET_SAMPLE_RATE as f64) as usize;
        let samples = (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / TARGET_SAMPLE_RATE as f64).sin() as f32 * 0.5)
            .collect();
        Waveform::new(samples, TARGET_SAMPLE_RATE).unwrap()
    }

    #[test]
    fn steady_tone_is_voiced_at_its_frequency() {
        let features = FeatureExtractor::default().extract(&tone(150.0, 2.0));

        assert!(features.voiced);
        assert!((features.pitch_mean_hz - 150.0).abs() < 1.0);
        assert!(features.pitch_variance_hz < 1.0);
        assert_eq!(features.frame_count, (32_000 - 2048) / 512 + 1);
        assert_eq!(features.active_frame_count, features.frame_count);
        assert_eq!(features.voiced_frame_count, features.frame_count);
        assert!(features.is_finite());
    }

    #[test]
    fn low_tone_pitch() {
        let features = FeatureExtractor::default().extract(&tone(46.0, 2.0));
        assert!(features.voiced);
        assert!((features.pitch_mean_hz - 46.0).abs() < 1.0);
    }

    #[test]
    fn zero_crossing_rate_tracks_frequency() {
        let extractor = FeatureExtractor::default();
        let low = extractor.extract(&tone(200.0, 1.0));
        let high = extractor.extract(&tone(2000.0, 1.0));
        // A sine crosses zero twice per period
        assert!((low.zero_crossing_rate - 400.0 / 16_000.0).abs() < 0.002);
        assert!(high.zero_crossing_rate > low.zero_crossing_rate * 5.0);
        assert!(high.spectral_centroid_hz > low.spectral_centroid_hz);
    }

    #[test]
    fn silence_is_unvoiced_and_finite() {
        let silence = Waveform::new(vec![0.0; 16_000], TARGET_SAMPLE_RATE).unwrap();
        let features = FeatureExtractor::default().extract(&silence);

        assert!(!features.voiced);
        assert_eq!(features.pitch_mean_hz, 0.0);
        assert_eq!(features.pitch_variance_hz, 0.0);
        assert_eq!(features.active_frame_count, 0);
        assert_eq!(features.spectral_centroid_hz, 0.0);
        assert_eq!(features.mfcc, [0.0; MFCC_COUNT]);
        assert!(features.is_finite());
    }

    #[test]
    fn short_waveform_yields_one_padded_frame() {
        let short = Waveform::new(vec![0.2, -0.2, 0.2, -0.2], TARGET_SAMPLE_RATE).unwrap();
        let features = FeatureExtractor::default().extract(&short);
        assert_eq!(features.frame_count, 1);
        assert!(!features.voiced);
        assert!(features.is_finite());
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = FeatureExtractor::default();
        let waveform = tone(220.0, 1.5);
        assert_eq!(extractor.extract(&waveform), extractor.extract(&waveform));
    }
}
