//! Short-time spectral analysis
//!
//! Hann-windowed magnitude spectra via rustfft, spectral centroid, and MFCCs
//! (triangular mel filterbank on the power spectrum, dB scale, orthonormal
//! DCT-II).

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::borrow::Cow;
use std::f64::consts::PI;
use std::sync::Arc;

/// Power floor before taking the logarithm
const POWER_FLOOR: f64 = 1e-10;

/// Split samples into fixed-length frames advanced by `hop`
///
/// Trailing samples that do not fill a whole frame are dropped, except when
/// the input is shorter than one frame: it is then zero-padded to a single
/// frame so that every non-empty input yields at least one frame.
pub fn frames(samples: &[f32], frame_length: usize, hop: usize) -> Vec<Cow<'_, [f32]>> {
    if samples.is_empty() || frame_length == 0 || hop == 0 {
        return Vec::new();
    }

    if samples.len() < frame_length {
        let mut padded = samples.to_vec();
        padded.resize(frame_length, 0.0);
        return vec![Cow::Owned(padded)];
    }

    let count = (samples.len() - frame_length) / hop + 1;
    (0..count)
        .map(|i| Cow::Borrowed(&samples[i * hop..i * hop + frame_length]))
        .collect()
}

/// Population mean and standard deviation; (0, 0) for an empty slice
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn hann_window(n: usize) -> Vec<f64> {
    // Periodic Hann, matching the usual STFT convention
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filters evaluated at each bin's center frequency
///
/// Returns `[num_mels][fft_size / 2 + 1]` weights spanning 0 Hz to Nyquist.
fn mel_filterbank(num_mels: usize, fft_size: usize, sample_rate: u32) -> Vec<Vec<f64>> {
    let half_fft = fft_size / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;
    let mel_high = hz_to_mel(nyquist);

    let edges_hz: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_to_hz(i as f64 * mel_high / (num_mels + 1) as f64))
        .collect();
    let bin_hz = sample_rate as f64 / fft_size as f64;

    (0..num_mels)
        .map(|m| {
            let (left, center, right) = (edges_hz[m], edges_hz[m + 1], edges_hz[m + 2]);
            (0..half_fft)
                .map(|k| {
                    let f = k as f64 * bin_hz;
                    if f <= left || f >= right {
                        0.0
                    } else if f <= center {
                        (f - left) / (center - left)
                    } else {
                        (right - f) / (right - center)
                    }
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis, `[num_coeffs][num_inputs]`
fn dct_basis(num_coeffs: usize, num_inputs: usize) -> Vec<Vec<f64>> {
    let n = num_inputs as f64;
    (0..num_coeffs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..num_inputs)
                .map(|i| scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

/// Precomputed FFT plan, window, mel filterbank and DCT basis
///
/// Immutable after construction; safe to share between threads.
pub struct SpectralAnalyzer {
    sample_rate: u32,
    frame_length: usize,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    mel_bank: Vec<Vec<f64>>,
    dct: Vec<Vec<f64>>,
}

impl SpectralAnalyzer {
    pub fn new(sample_rate: u32, frame_length: usize, num_mels: usize, num_coeffs: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            sample_rate,
            frame_length,
            fft: planner.plan_fft_forward(frame_length),
            window: hann_window(frame_length),
            mel_bank: mel_filterbank(num_mels, frame_length, sample_rate),
            dct: dct_basis(num_coeffs, num_mels),
        }
    }

    /// Width of one FFT bin in Hz
    pub fn bin_hz(&self) -> f64 {
        self.sample_rate as f64 / self.frame_length as f64
    }

    /// Magnitude spectrum (bins 0..=N/2) of one windowed frame
    ///
    /// Frames shorter than the analysis length are zero-padded.
    pub fn magnitudes(&self, frame: &[f32]) -> Vec<f64> {
        let mut buffer: Vec<Complex<f64>> = (0..self.frame_length)
            .map(|i| {
                let sample = frame.get(i).copied().unwrap_or(0.0) as f64;
                Complex::new(sample * self.window[i], 0.0)
            })
            .collect();

        self.fft.process(&mut buffer);

        buffer[..self.frame_length / 2 + 1]
            .iter()
            .map(|c| c.norm())
            .collect()
    }

    /// Magnitude-weighted mean frequency; `None` for an all-zero spectrum
    pub fn centroid(&self, magnitudes: &[f64]) -> Option<f64> {
        let total: f64 = magnitudes.iter().sum();
        if total <= f64::EPSILON {
            return None;
        }
        let bin_hz = self.bin_hz();
        let weighted: f64 = magnitudes
            .iter()
            .enumerate()
            .map(|(k, m)| k as f64 * bin_hz * m)
            .sum();
        Some(weighted / total)
    }

    /// Cepstral coefficients of one frame from its magnitude spectrum
    pub fn mfcc(&self, magnitudes: &[f64]) -> Vec<f64> {
        let log_mel: Vec<f64> = self
            .mel_bank
            .iter()
            .map(|filter| {
                let energy: f64 = filter
                    .iter()
                    .zip(magnitudes)
                    .map(|(w, m)| w * m * m)
                    .sum();
                10.0 * energy.max(POWER_FLOOR).log10()
            })
            .collect();

        self.dct
            .iter()
            .map(|basis| basis.iter().zip(&log_mel).map(|(b, v)| b * v).sum())
            .collect()
    }
}

/// Fraction of adjacent sample pairs whose sign differs, in [0, 1]
pub fn zero_crossing_rate(frame: &[f32]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / frame.len() as f64
}

/// Root-mean-square amplitude of a frame
pub fn rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = frame.iter().map(|&s| (s as f64).powi(2)).sum();
    (sum_squares / frame.len() as f64).sqrt()
}
