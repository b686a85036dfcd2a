//! Error types for trust operations.

use thiserror::Error;

/// Structural failure while decoding a persisted trust record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Expected an array")]
    NotAnArray,

    /// Container held the wrong number of elements
    #[error("Expected {expected} elements, found {found}")]
    Arity { expected: usize, found: usize },

    #[error("Malformed record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("Edge {edge} has no capability {capability}")]
    UnknownCapability { edge: String, capability: String },

    #[error("Throughput thresholds for {capability} must be positive (inbound {inbound}, outbound {outbound})")]
    InvalidThreshold {
        capability: String,
        inbound: f64,
        outbound: f64,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

pub type Result<T> = std::result::Result<T, TrustError>;
