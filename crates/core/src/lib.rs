//! Core functionality for the EdgeTrust edge-node trust stack.
//!
//! This crate provides the fundamental types, configuration and logging
//! bootstrap shared by the identity, registry and trust crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    ApplicationWeights, KeystoreConfig, NodeConfig, NodeSection, RegistryConfig,
    ThroughputThresholdConfig, TrustConfig, TrustModelKind,
};
pub use error::{CoreError, Result};
pub use logging::LogFormat;
pub use types::{
    current_timestamp_ms, eui64_from_address, normalise_address, Eui64, ResponseCode,
    EUI64_LENGTH, MAX_CAPABILITY_NAME_LENGTH,
};
