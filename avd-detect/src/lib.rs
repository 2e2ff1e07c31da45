//! avd-detect library interface
//!
//! Detection pipeline plus the axum router around it. Exposed as a library
//! for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};
pub use crate::services::VoiceDetector;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded pipeline, read-only after startup
    pub detector: Arc<VoiceDetector>,
    /// SHA-256 digest of the configured API key
    pub api_key_digest: [u8; 32],
    /// Request body limit in bytes
    pub max_body_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last internal error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(detector: Arc<VoiceDetector>, api_key: &str, max_body_bytes: usize) -> Self {
        Self {
            detector,
            api_key_digest: avd_common::api::digest_key(api_key),
            max_body_bytes,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;

    Router::new()
        .merge(api::health_routes())
        .merge(api::detection_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
