//! Error types for avd-detect
//!
//! Pipeline errors (`DecodeError`, `InferenceError`, `ModelLoadError`) carry no
//! transport concepts. `ApiError` is the only type that knows about HTTP
//! status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use avd_common::api::ErrorResponse;
use thiserror::Error;

/// Audio payload could not be turned into a waveform
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed base64 audio: {0}")]
    InvalidBase64(String),

    #[error("audio payload is empty")]
    EmptyPayload,

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt or unreadable audio container: {0}")]
    Container(String),

    #[error("payload declared as {declared} holds a {detected} stream")]
    FormatMismatch {
        declared: String,
        detected: String,
    },

    #[error("no audio track found in payload")]
    NoAudioTrack,

    #[error("decoded audio contains no samples")]
    EmptyAudio,

    #[error("resampling failed: {0}")]
    Resample(String),
}

/// Embedding model or scorer head could not produce a score
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("audio too short: need at least {min_samples} samples, got {got_samples}")]
    AudioTooShort {
        min_samples: usize,
        got_samples: usize,
    },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("numerical fault: {0}")]
    Numerical(String),

    #[error("inference backend error: {0}")]
    Backend(String),
}

impl From<candle_core::Error> for InferenceError {
    fn from(err: candle_core::Error) -> Self {
        InferenceError::Backend(err.to_string())
    }
}

/// Pre-trained model or scorer weights failed to initialize (fatal)
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model configuration: {0}")]
    Config(String),

    #[error("failed to load weights: {0}")]
    Weights(String),
}

impl From<candle_core::Error> for ModelLoadError {
    fn from(err: candle_core::Error) -> Self {
        ModelLoadError::Weights(err.to_string())
    }
}

/// Failure of one pipeline invocation
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid input: {0}")]
    BadRequest(String),

    /// Missing or wrong API key (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        // Both kinds mean the submitted audio is unusable
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
