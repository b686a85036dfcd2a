//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors raised by the crypto backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key bytes do not describe a valid curve point or scalar
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signature bytes are malformed
    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    /// Signature did not verify against the given key
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Key agreement failed
    #[error("ECDH failed: {0}")]
    KeyAgreement(String),

    /// The backend could not complete the job (accelerator fault, cancelled task)
    #[error("Crypto backend error: {0}")]
    Backend(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
