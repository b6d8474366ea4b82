//! Error types for the Warden service.

use thiserror::Error;

/// Main error type for Warden operations.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// gRPC server errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for WardenError {
    fn from(err: ::config::ConfigError) -> Self {
        WardenError::Config(err.to_string())
    }
}

/// Result type alias for Warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
