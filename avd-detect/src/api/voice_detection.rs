//! Voice detection endpoint
//!
//! POST /api/voice-detection
//!
//! **Request flow:**
//! 1. `x-api-key` check (SHA-256 digest comparison)
//! 2. JSON body validation (schema, language, payload length)
//! 3. Pipeline on the blocking pool
//! 4. Verdict with the confidence rounded to two decimals

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use avd_common::api::{
    verify_api_key, VoiceDetectionRequest, VoiceDetectionResponse, API_KEY_HEADER,
    MIN_AUDIO_BASE64_LEN,
};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Round to two decimal places
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// POST /api/voice-detection
pub async fn detect_voice(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<VoiceDetectionRequest>, JsonRejection>,
) -> ApiResult<Json<VoiceDetectionResponse>> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(e) = verify_api_key(provided, &state.api_key_digest) {
        tracing::warn!(reason = %e, "Rejected request");
        return Err(ApiError::Unauthorized("Invalid API key".to_string()));
    }

    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    if request.audio_base64.len() < MIN_AUDIO_BASE64_LEN {
        return Err(ApiError::BadRequest(format!(
            "audioBase64 must be at least {} characters",
            MIN_AUDIO_BASE64_LEN
        )));
    }

    let detector = state.detector.clone();
    let outcome = tokio::task::spawn_blocking(move || detector.classify(&request)).await;

    let result = match outcome {
        Ok(result) => result?,
        Err(join_error) => {
            let message = format!("detection task failed: {}", join_error);
            tracing::error!(error = %message, "Detection pipeline aborted");
            *state.last_error.write().await = Some(message.clone());
            return Err(ApiError::Internal(message));
        }
    };

    Ok(Json(VoiceDetectionResponse {
        status: "success".to_string(),
        language: result.language,
        classification: result.label,
        confidence_score: round2(result.confidence),
        explanation: result.explanation,
    }))
}

/// Build voice detection routes
pub fn detection_routes() -> Router<AppState> {
    Router::new().route("/api/voice-detection", post(detect_voice))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_rounded_to_two_places() {
        assert_eq!(round2(0.8612), 0.86);
        assert_eq!(round2(0.276), 0.28);
        assert_eq!(round2(1.0), 1.0);
    }
}
