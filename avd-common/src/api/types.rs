//! Request/response types of the voice detection API

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum length of the `audioBase64` field
pub const MIN_AUDIO_BASE64_LEN: usize = 100;

/// Spoken language tag
///
/// Echoed back to the caller; never used to select feature thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Tamil,
    English,
    Hindi,
    Malayalam,
    Telugu,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Tamil,
        Language::English,
        Language::Hindi,
        Language::Malayalam,
        Language::Telugu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Tamil => "Tamil",
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Malayalam => "Malayalam",
            Language::Telugu => "Telugu",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == s)
            .ok_or_else(|| format!("Unsupported language: {}", s))
    }
}

/// Verdict label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "AI_GENERATED")]
    AiGenerated,
    #[serde(rename = "HUMAN")]
    Human,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::AiGenerated => "AI_GENERATED",
            Classification::Human => "HUMAN",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// POST /api/voice-detection request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceDetectionRequest {
    pub language: Language,
    /// Format tag, validated by the decoder (e.g. "mp3")
    pub audio_format: String,
    pub audio_base64: String,
}

/// Successful detection response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceDetectionResponse {
    /// Always "success"
    pub status: String,
    pub language: Language,
    pub classification: Classification,
    pub confidence_score: f64,
    pub explanation: String,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always "error"
    pub status: String,
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            detail: detail.into(),
        }
    }
}
