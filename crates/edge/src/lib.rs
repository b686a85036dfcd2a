//! Edge Registry: the fixed-capacity directory of known edge servers.
//!
//! Each [`EdgeResource`] owns its [`EdgeCapability`] list and embeds the
//! trust statistics for itself (`E`) and each capability (`C`). The registry
//! is a plain data container; it never grows past its configured capacity.

pub mod error;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::{
    EdgeCapability, EdgeRegistry, EdgeResource, RegistryLimits, ResourceId,
    MAX_CAPABILITY_NAME_LENGTH, MAX_IDENTITY_LENGTH,
};
