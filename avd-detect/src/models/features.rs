//! Acoustic descriptors and model embeddings

/// Number of cepstral coefficients kept per frame
pub const MFCC_COUNT: usize = 13;

/// Language-agnostic acoustic descriptors of one waveform
///
/// All values are finite. When too few frames are voiced, `voiced` is false
/// and both pitch statistics are 0.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    /// Mean fundamental frequency over voiced frames (Hz)
    pub pitch_mean_hz: f64,
    /// Variance of the fundamental frequency over voiced frames (Hz²)
    pub pitch_variance_hz: f64,
    /// Whether enough frames carried a pitch to trust the statistics
    pub voiced: bool,
    /// Spectral centroid averaged over active frames (Hz)
    pub spectral_centroid_hz: f64,
    /// Cross-frame standard deviation of the spectral centroid (Hz)
    pub spectral_centroid_std_hz: f64,
    /// Zero-crossing rate averaged over frames, in [0, 1]
    pub zero_crossing_rate: f64,
    /// Cross-frame standard deviation of the zero-crossing rate
    pub zero_crossing_rate_std: f64,
    /// Frame-averaged MFCCs (dB scale)
    pub mfcc: [f64; MFCC_COUNT],
    /// Per-coefficient cross-frame standard deviation of the MFCCs
    pub mfcc_std: [f64; MFCC_COUNT],
    /// Frames analyzed
    pub frame_count: usize,
    /// Frames above the silence floor
    pub active_frame_count: usize,
    /// Frames with a detected pitch
    pub voiced_frame_count: usize,
}

impl FeatureSet {
    /// Standard deviation of the pitch track (Hz)
    pub fn pitch_std_hz(&self) -> f64 {
        self.pitch_variance_hz.sqrt()
    }

    /// Mean MFCC spread over c1..c12 (c0 tracks loudness, not timbre)
    pub fn mfcc_spread(&self) -> f64 {
        let tail = &self.mfcc_std[1..];
        tail.iter().sum::<f64>() / tail.len() as f64
    }

    /// Spectral centroid standard deviation relative to its mean
    ///
    /// 0 when the centroid is 0 (no active frames).
    pub fn centroid_variation(&self) -> f64 {
        if self.spectral_centroid_hz > 0.0 {
            self.spectral_centroid_std_hz / self.spectral_centroid_hz
        } else {
            0.0
        }
    }

    /// All fields finite
    pub fn is_finite(&self) -> bool {
        [
            self.pitch_mean_hz,
            self.pitch_variance_hz,
            self.spectral_centroid_hz,
            self.spectral_centroid_std_hz,
            self.zero_crossing_rate,
            self.zero_crossing_rate_std,
        ]
        .iter()
        .chain(self.mfcc.iter())
        .chain(self.mfcc_std.iter())
        .all(|v| v.is_finite())
    }
}

/// Pooled output of the speech-representation model
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::voiced;

    #[test]
    fn mfcc_spread_skips_energy_coefficient() {
        let mut features = voiced(150.0);
        features.mfcc_std[0] = 100.0;
        assert_eq!(features.mfcc_spread(), 9.0);
    }

    #[test]
    fn centroid_variation_handles_silence() {
        let mut features = voiced(150.0);
        assert_eq!(features.centroid_variation(), 0.25);
        features.spectral_centroid_hz = 0.0;
        assert_eq!(features.centroid_variation(), 0.0);
    }

    #[test]
    fn pitch_std_is_sqrt_of_variance() {
        assert_eq!(voiced(120.0).pitch_std_hz(), 20.0);
    }
}
