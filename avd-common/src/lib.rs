//! # AVD Common Library
//!
//! Shared code for the AI voice detection service:
//! - Bootstrap configuration loading and resolution
//! - API request/response types
//! - API key verification
//! - Common error type

pub mod api;
pub mod config;
pub mod error;

pub use error::{Error, Result};
