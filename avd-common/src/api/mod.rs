//! API module for shared HTTP API functionality
//!
//! Contains ONLY pure functions and shared types. The axum wiring lives in
//! `avd-detect`.

pub mod auth;
pub mod types;

pub use auth::{digest_key, verify_api_key, ApiKeyError, API_KEY_HEADER};
pub use types::{
    Classification, ErrorResponse, Language, VoiceDetectionRequest, VoiceDetectionResponse,
    MIN_AUDIO_BASE64_LEN,
};
