//! Frame-wise fundamental frequency estimation (YIN)
//!
//! **Algorithm:**
//! 1. Difference function d(τ) over the search lags
//! 2. Cumulative mean normalized difference d'(τ)
//! 3. First lag whose d'(τ) drops below the threshold, walked down to the
//!    local minimum
//! 4. Parabolic interpolation around that minimum
//!
//! A frame without a dip below the threshold is unvoiced.

/// YIN pitch estimator for a fixed sample rate and search range
#[derive(Debug, Clone)]
pub struct YinEstimator {
    sample_rate: u32,
    min_hz: f64,
    max_hz: f64,
    min_lag: usize,
    max_lag: usize,
    threshold: f64,
}

impl YinEstimator {
    pub fn new(sample_rate: u32, min_hz: f64, max_hz: f64, threshold: f64) -> Self {
        let sr = sample_rate as f64;
        Self {
            sample_rate,
            min_hz,
            max_hz,
            min_lag: (sr / max_hz).floor().max(2.0) as usize,
            max_lag: (sr / min_hz).ceil() as usize,
            threshold,
        }
    }

    /// Shortest frame that can resolve `min_hz`
    pub fn min_frame_length(&self) -> usize {
        2 * self.max_lag
    }

    /// Fundamental frequency of one frame in Hz, `None` when unvoiced
    pub fn estimate(&self, frame: &[f32]) -> Option<f64> {
        let max_lag = self.max_lag.min(frame.len() / 2);
        if max_lag <= self.min_lag + 1 {
            return None;
        }
        let window = frame.len() - max_lag;

        let mut diff = vec![0.0f64; max_lag + 1];
        for (tau, slot) in diff.iter_mut().enumerate().skip(1) {
            *slot = (0..window)
                .map(|j| {
                    let d = frame[j] as f64 - frame[j + tau] as f64;
                    d * d
                })
                .sum();
        }

        let mut cmnd = vec![1.0f64; max_lag + 1];
        let mut running = 0.0;
        for tau in 1..=max_lag {
            running += diff[tau];
            cmnd[tau] = if running > 0.0 {
                diff[tau] * tau as f64 / running
            } else {
                1.0
            };
        }

        let mut tau = self.min_lag;
        let mut found = None;
        while tau < max_lag {
            if cmnd[tau] < self.threshold {
                while tau + 1 < max_lag && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                found = Some(tau);
                break;
            }
            tau += 1;
        }
        let tau = found?;

        let refined = if tau > 1 && tau < max_lag {
            let (a, b, c) = (cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);
            let denom = a - 2.0 * b + c;
            if denom.abs() > 1e-12 {
                tau as f64 + 0.5 * (a - c) / denom
            } else {
                tau as f64
            }
        } else {
            tau as f64
        };

        let f0 = self.sample_rate as f64 / refined;
        (f0 >= self.min_hz && f0 <= self.max_hz).then_some(f0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / 16_000.0).sin() as f32 * 0.6)
            .collect()
    }

    fn estimator() -> YinEstimator {
        YinEstimator::new(16_000, 40.0, 500.0, 0.15)
    }

    #[test]
    fn lag_range_covers_search_band() {
        let yin = estimator();
        assert_eq!(yin.min_lag, 32);
        assert_eq!(yin.max_lag, 400);
        assert_eq!(yin.min_frame_length(), 800);
    }

    #[test]
    fn pure_tones_are_tracked() {
        let yin = estimator();
        for freq in [46.0, 59.0, 61.0, 150.0, 220.0, 440.0] {
            let f0 = yin.estimate(&sine(freq, 2048)).unwrap();
            assert!((f0 - freq).abs() < 0.5, "expected {} Hz, got {}", freq, f0);
        }
    }

    #[test]
    fn silence_is_unvoiced() {
        assert!(estimator().estimate(&[0.0; 2048]).is_none());
    }

    #[test]
    fn too_short_frame_is_unvoiced() {
        assert!(estimator().estimate(&sine(200.0, 40)).is_none());
    }

    #[test]
    fn white_noise_is_unvoiced() {
        let mut state: u32 = 0x1234_5678;
        let frame: Vec<f32> = (0..2048)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        assert!(estimator().estimate(&frame).is_none());
    }
}
