//! API key verification
//!
//! Keys are compared through their SHA-256 digests so the comparison
//! always touches the same number of bytes regardless of where the
//! provided key diverges.

use sha2::{Digest, Sha256};

/// Request header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// API key validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyError {
    /// Header absent from the request
    Missing,
    /// Header present but does not match the configured key
    Invalid,
}

impl std::fmt::Display for ApiKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiKeyError::Missing => write!(f, "Missing API key"),
            ApiKeyError::Invalid => write!(f, "Invalid API key"),
        }
    }
}

impl std::error::Error for ApiKeyError {}

/// SHA-256 digest of an API key
pub fn digest_key(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Check a provided key against the digest of the configured key
pub fn verify_api_key(provided: Option<&str>, expected_digest: &[u8; 32]) -> Result<(), ApiKeyError> {
    let provided = provided.ok_or(ApiKeyError::Missing)?;
    let digest = digest_key(provided);

    let diff = digest
        .iter()
        .zip(expected_digest.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));

    if diff == 0 {
        Ok(())
    } else {
        Err(ApiKeyError::Invalid)
    }
}
