//! Core error types

use thiserror::Error;

/// Core error type for EdgeTrust
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed identity or key material
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Configuration could not be parsed or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
