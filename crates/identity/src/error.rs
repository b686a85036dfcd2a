//! Error types for the certificate store and key-request protocol.

use edgetrust_core::{Eui64, ResponseCode};
use edgetrust_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur in certificate store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Certificate pool is full
    #[error("Certificate store exhausted (capacity {capacity})")]
    ResourceExhausted { capacity: usize },

    /// Entry is referenced and cannot be reclaimed
    #[error("Entry for {subject} is pinned ({pins} references)")]
    Pinned { subject: Eui64, pins: u32 },

    /// No live entry for the given subject or id
    #[error("Certificate not found: {0}")]
    NotFound(String),

    /// Malformed certificate record
    #[error("Certificate encoding error: {0}")]
    Encoding(String),

    /// Crypto backend failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Failure reported by a [`Transport`](crate::key_request::Transport).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No response before the transport gave up
    #[error("Request timed out")]
    Timeout,

    /// Request could not be sent
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Errors on the public-key request path. Every one of them releases the request lock.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyRequestError {
    /// Key server answered with something other than content
    #[error("Key server responded with {0}")]
    Status(ResponseCode),

    /// Malformed or oversized response payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] IdentityError),
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
