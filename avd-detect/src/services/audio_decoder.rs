//! Audio decoding
//!
//! **Algorithm:**
//! 1. Base64 transport decoding (standard alphabet)
//! 2. Probe the container with symphonia, using the format tag as hint, and
//!    reject streams whose codec contradicts the tag
//! 3. Decode every packet of the default audio track
//! 4. Average all channels to mono
//! 5. Resample to 16 kHz with rubato when the native rate differs

use crate::error::DecodeError;
use crate::models::{AudioFormat, EncodedAudio, Waveform, TARGET_SAMPLE_RATE};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::io::Cursor;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Decodes transport payloads into mono waveforms at the analysis rate
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    target_sample_rate: u32,
}

impl AudioDecoder {
    pub fn new() -> Self {
        Self {
            target_sample_rate: TARGET_SAMPLE_RATE,
        }
    }

    /// Decode a base64 transport string
    ///
    /// Surrounding whitespace is ignored.
    pub fn decode_base64(&self, text: &str, format: AudioFormat) -> Result<Waveform, DecodeError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
        self.decode(EncodedAudio::new(bytes, format))
    }

    /// Decode container bytes to a mono waveform at 16 kHz
    ///
    /// # Errors
    /// * `EmptyPayload` - no bytes
    /// * `Container` - probe, codec or packet read failure
    /// * `FormatMismatch` - probed codec contradicts the declared format
    /// * `NoAudioTrack` - container holds no decodable track
    /// * `EmptyAudio` - nothing decoded
    /// * `Resample` - resampler rejected the input
    pub fn decode(&self, audio: EncodedAudio) -> Result<Waveform, DecodeError> {
        if audio.is_empty() {
            return Err(DecodeError::EmptyPayload);
        }

        let format_tag = audio.format();
        let payload_bytes = audio.len();
        tracing::debug!(format = %format_tag, bytes = payload_bytes, "Decoding audio payload");

        let mss = MediaSourceStream::new(
            Box::new(Cursor::new(audio.into_bytes())),
            Default::default(),
        );

        let mut hint = Hint::new();
        hint.with_extension(format_tag.extension());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::Container(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;

        if !format_tag.accepts_codec(track.codec_params.codec) {
            let detected = symphonia::default::get_codecs()
                .get_codec(track.codec_params.codec)
                .map(|d| d.short_name.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(DecodeError::FormatMismatch {
                declared: format_tag.to_string(),
                detected,
            });
        }

        let track_id = track.id;
        let native_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| DecodeError::Container("sample rate unknown".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Container(e.to_string()))?;

        let mut mono: Vec<f32> = Vec::new();
        let mut skipped_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(DecodeError::Container(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => mono.extend(downmix(&decoded)),
                Err(SymphoniaError::DecodeError(msg)) => {
                    // Corrupt packet; the stream may still recover
                    skipped_packets += 1;
                    tracing::warn!(error = msg, "Skipping undecodable packet");
                }
                Err(e) => return Err(DecodeError::Container(e.to_string())),
            }
        }

        if mono.is_empty() {
            return Err(DecodeError::EmptyAudio);
        }

        tracing::debug!(
            format = %format_tag,
            native_rate = native_rate,
            samples = mono.len(),
            skipped_packets = skipped_packets,
            duration_seconds = format!("{:.2}", mono.len() as f64 / native_rate as f64),
            "Audio decoding complete"
        );

        let samples = if native_rate != self.target_sample_rate {
            resample_mono(mono, native_rate, self.target_sample_rate)?
        } else {
            mono
        };

        Waveform::new(samples, self.target_sample_rate)
    }
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Average all channels of one decoded buffer into mono f32
fn downmix(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::U8(buf) => average_channels(buf),
        AudioBufferRef::U16(buf) => average_channels(buf),
        AudioBufferRef::U24(buf) => average_channels(buf),
        AudioBufferRef::U32(buf) => average_channels(buf),
        AudioBufferRef::S8(buf) => average_channels(buf),
        AudioBufferRef::S16(buf) => average_channels(buf),
        AudioBufferRef::S24(buf) => average_channels(buf),
        AudioBufferRef::S32(buf) => average_channels(buf),
        AudioBufferRef::F32(buf) => average_channels(buf),
        AudioBufferRef::F64(buf) => average_channels(buf),
    }
}

fn average_channels<S>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    S: Sample,
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count();
    let num_frames = buf.frames();
    if num_channels == 0 {
        return Vec::new();
    }

    let mut mono = vec![0.0f32; num_frames];
    for ch in 0..num_channels {
        for (acc, &sample) in mono.iter_mut().zip(buf.chan(ch)) {
            *acc += f32::from_sample(sample);
        }
    }
    let scale = 1.0 / num_channels as f32;
    mono.iter_mut().for_each(|s| *s *= scale);
    mono
}

/// Resample mono PCM with a 256-tap sinc interpolator
///
/// The whole buffer is processed as one chunk, then a zero-filled partial
/// chunk flushes the tail. The interpolator's output delay is trimmed so the
/// result is aligned with the input and has `round(len * ratio)` samples.
fn resample_mono(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>, DecodeError> {
    let num_frames = samples.len();

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let expected_frames = (num_frames as f64 * ratio).round() as usize;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, num_frames, 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;
    let delay = resampler.output_delay();

    let mut head = resampler
        .process(&[samples], None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;
    let mut tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let mut resampled = head.pop().unwrap_or_default();
    resampled.extend(tail.pop().unwrap_or_default());
    let resampled: Vec<f32> = resampled
        .into_iter()
        .skip(delay)
        .take(expected_frames)
        .collect();

    tracing::debug!(
        input_frames = num_frames,
        source_rate = source_rate,
        output_frames = resampled.len(),
        output_delay = delay,
        target_rate = target_rate,
        "Resampled audio"
    );

    Ok(resampled)
}
