//! DSP building blocks used by the feature extractor

pub mod pitch;
pub mod spectral;

pub use pitch::YinEstimator;
pub use spectral::{frames, mean_std, SpectralAnalyzer};
