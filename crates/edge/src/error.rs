use std::net::Ipv6Addr;
use thiserror::Error;

/// Errors that can occur in registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Resource or capability pool is full
    #[error("{what} capacity {capacity} exhausted")]
    ResourceExhausted { what: &'static str, capacity: usize },

    /// Address already belongs to a different identity
    #[error("Address {address} already registered to {identity}")]
    AddressInUse { address: Ipv6Addr, identity: String },

    #[error("Name too long: {name:?} exceeds {max} bytes")]
    NameTooLong { name: String, max: usize },

    #[error("Unknown edge resource: {0}")]
    UnknownResource(String),

    #[error("Unknown capability {capability} on {resource}")]
    UnknownCapability { resource: String, capability: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
