//! Common error types for AVD

use thiserror::Error;

/// Common result type for AVD operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the AVD crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = Error::Config("api_key missing".to_string());
        assert_eq!(err.to_string(), "Configuration error: api_key missing");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml");
        let err: Error = io.into();
        assert!(err.to_string().starts_with("IO error:"));
    }
}
