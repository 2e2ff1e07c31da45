//! Encoded payloads and decoded waveforms

use crate::error::DecodeError;
use std::fmt;
use std::str::FromStr;
use symphonia::core::codecs::{CodecType, CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_MP3};

/// Sample rate shared by the feature extractor and the embedding model
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Accepted container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Extension handed to symphonia's probe as a hint
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    /// Whether a probed stream is plausible for this declared format
    ///
    /// The extension is only a probe hint, so symphonia will happily open a
    /// RIFF payload tagged `mp3`. MPEG audio is accepted for `mp3` alone.
    pub fn accepts_codec(&self, codec: CodecType) -> bool {
        let mpeg_audio = [CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_MP3].contains(&codec);
        match self {
            AudioFormat::Mp3 => mpeg_audio,
            AudioFormat::Wav => !mpeg_audio,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = DecodeError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            _ => Err(DecodeError::UnsupportedFormat(tag.to_string())),
        }
    }
}

/// Raw container bytes plus their declared format
#[derive(Debug)]
pub struct EncodedAudio {
    bytes: Vec<u8>,
    format: AudioFormat,
}

impl EncodedAudio {
    pub fn new(bytes: Vec<u8>, format: AudioFormat) -> Self {
        Self { bytes, format }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hand the bytes over to the decoder
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Mono PCM at [`TARGET_SAMPLE_RATE`]
///
/// Invariant: never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Wrap mono samples; rejects an empty buffer
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, DecodeError> {
        if samples.is_empty() {
            return Err(DecodeError::EmptyAudio);
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Always 1: the decoder downmixes
    pub fn channels(&self) -> u16 {
        1
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_tags_are_case_insensitive() {
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!(" wav ".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
    }

    #[test]
    fn unknown_format_tag_is_decode_error() {
        let err = "ogg".parse::<AudioFormat>().unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(ref tag) if tag == "ogg"));
    }

    #[test]
    fn declared_format_constrains_codec() {
        use symphonia::core::codecs::CODEC_TYPE_PCM_S16LE;

        assert!(AudioFormat::Mp3.accepts_codec(CODEC_TYPE_MP3));
        assert!(!AudioFormat::Mp3.accepts_codec(CODEC_TYPE_PCM_S16LE));
        assert!(AudioFormat::Wav.accepts_codec(CODEC_TYPE_PCM_S16LE));
        assert!(!AudioFormat::Wav.accepts_codec(CODEC_TYPE_MP3));
    }

    #[test]
    fn empty_waveform_is_rejected() {
        assert!(matches!(
            Waveform::new(Vec::new(), TARGET_SAMPLE_RATE),
            Err(DecodeError::EmptyAudio)
        ));
    }

    #[test]
    fn waveform_duration() {
        let waveform = Waveform::new(vec![0.0; 8_000], TARGET_SAMPLE_RATE).unwrap();
        assert_eq!(waveform.duration_seconds(), 0.5);
        assert_eq!(waveform.channels(), 1);
    }
}
