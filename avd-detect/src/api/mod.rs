//! HTTP API handlers for avd-detect

pub mod health;
pub mod voice_detection;

pub use health::health_routes;
pub use voice_detection::detection_routes;
