use edgetrust_core::{normalise_address, RegistryConfig};
pub use edgetrust_core::MAX_CAPABILITY_NAME_LENGTH;
use std::fmt;
use std::net::Ipv6Addr;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};

/// Longest accepted edge identity.
pub const MAX_IDENTITY_LENGTH: usize = 32;

/// Registry-assigned handle for an edge resource. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
    pub edges: usize,
    /// Capabilities across all edges
    pub capabilities: usize,
    pub capabilities_per_edge: usize,
}

impl From<&RegistryConfig> for RegistryLimits {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            edges: config.edge_capacity,
            capabilities: config.capability_capacity,
            capabilities_per_edge: config.capabilities_per_edge,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeCapability<C> {
    name: String,
    pub trust: C,
}

impl<C> EdgeCapability<C> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct EdgeResource<E, C> {
    id: ResourceId,
    address: Ipv6Addr,
    identity: String,
    capabilities: Vec<EdgeCapability<C>>,
    pub trust: E,
}

impl<E, C> EdgeResource<E, C> {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Normalised (global) address of the edge.
    pub fn address(&self) -> Ipv6Addr {
        self.address
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Capabilities in the order they were announced.
    pub fn capabilities(&self) -> impl Iterator<Item = &EdgeCapability<C>> {
        self.capabilities.iter()
    }

    pub fn capability(&self, name: &str) -> Option<&EdgeCapability<C>> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    pub fn capability_mut(&mut self, name: &str) -> Option<&mut EdgeCapability<C>> {
        self.capabilities.iter_mut().find(|c| c.name == name)
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capability(name).is_some()
    }

    pub fn capability_count(&self) -> usize {
        self.capabilities.len()
    }
}

/// Directory of edge resources, generic over the trust records it embeds.
#[derive(Debug)]
pub struct EdgeRegistry<E, C> {
    resources: Vec<EdgeResource<E, C>>,
    limits: RegistryLimits,
    next_id: u32,
}

impl<E: Default, C: Default> EdgeRegistry<E, C> {
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            resources: Vec::with_capacity(limits.edges),
            limits,
            next_id: 0,
        }
    }

    pub fn limits(&self) -> RegistryLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn capability_total(&self) -> usize {
        self.resources.iter().map(|r| r.capabilities.len()).sum()
    }

    /// Register an edge, or return the existing entry for `identity`.
    pub fn add(&mut self, address: Ipv6Addr, identity: &str) -> Result<&mut EdgeResource<E, C>> {
        if identity.len() > MAX_IDENTITY_LENGTH {
            return Err(RegistryError::NameTooLong {
                name: identity.to_string(),
                max: MAX_IDENTITY_LENGTH,
            });
        }
        let address = normalise_address(&address);

        if let Some(pos) = self.resources.iter().position(|r| r.identity == identity) {
            debug!(identity, "edge already registered");
            return Ok(&mut self.resources[pos]);
        }

        if let Some(owner) = self.resources.iter().find(|r| r.address == address) {
            return Err(RegistryError::AddressInUse {
                address,
                identity: owner.identity.clone(),
            });
        }

        if self.resources.len() >= self.limits.edges {
            warn!(identity, capacity = self.limits.edges, "edge registry full");
            return Err(RegistryError::ResourceExhausted {
                what: "edge",
                capacity: self.limits.edges,
            });
        }

        let id = ResourceId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        info!(identity, address = %address, id = %id, "edge added");

        self.resources.push(EdgeResource {
            id,
            address,
            identity: identity.to_string(),
            capabilities: Vec::with_capacity(self.limits.capabilities_per_edge),
            trust: E::default(),
        });
        let last = self.resources.len() - 1;
        Ok(&mut self.resources[last])
    }

    /// Deregister an edge together with its capabilities.
    pub fn remove(&mut self, id: ResourceId) -> Result<EdgeResource<E, C>> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RegistryError::UnknownResource(id.to_string()))?;
        let resource = self.resources.remove(pos);
        info!(identity = %resource.identity, "edge removed");
        Ok(resource)
    }

    pub fn get(&self, id: ResourceId) -> Option<&EdgeResource<E, C>> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut EdgeResource<E, C>> {
        self.resources.iter_mut().find(|r| r.id == id)
    }

    pub fn find_by_address(&self, address: &Ipv6Addr) -> Option<&EdgeResource<E, C>> {
        let address = normalise_address(address);
        self.resources.iter().find(|r| r.address == address)
    }

    pub fn find_by_address_mut(&mut self, address: &Ipv6Addr) -> Option<&mut EdgeResource<E, C>> {
        let address = normalise_address(address);
        self.resources.iter_mut().find(|r| r.address == address)
    }

    pub fn find_by_identity(&self, identity: &str) -> Option<&EdgeResource<E, C>> {
        self.resources.iter().find(|r| r.identity == identity)
    }

    pub fn find_by_identity_mut(&mut self, identity: &str) -> Option<&mut EdgeResource<E, C>> {
        self.resources.iter_mut().find(|r| r.identity == identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EdgeResource<E, C>> {
        self.resources.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EdgeResource<E, C>> {
        self.resources.iter_mut()
    }

    /// Add a capability to an edge, or return the existing one of that name.
    pub fn add_capability(&mut self, id: ResourceId, name: &str) -> Result<&mut EdgeCapability<C>> {
        if name.len() > MAX_CAPABILITY_NAME_LENGTH {
            return Err(RegistryError::NameTooLong {
                name: name.to_string(),
                max: MAX_CAPABILITY_NAME_LENGTH,
            });
        }

        let total = self.capability_total();
        let limits = self.limits;
        let resource = self
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownResource(id.to_string()))?;

        if let Some(pos) = resource.capabilities.iter().position(|c| c.name == name) {
            return Ok(&mut resource.capabilities[pos]);
        }

        if resource.capabilities.len() >= limits.capabilities_per_edge {
            return Err(RegistryError::ResourceExhausted {
                what: "per-edge capability",
                capacity: limits.capabilities_per_edge,
            });
        }
        if total >= limits.capabilities {
            warn!(capability = name, capacity = limits.capabilities, "capability pool full");
            return Err(RegistryError::ResourceExhausted {
                what: "capability",
                capacity: limits.capabilities,
            });
        }

        info!(identity = %resource.identity, capability = name, "capability added");
        resource.capabilities.push(EdgeCapability {
            name: name.to_string(),
            trust: C::default(),
        });
        let last = resource.capabilities.len() - 1;
        Ok(&mut resource.capabilities[last])
    }

    pub fn remove_capability(&mut self, id: ResourceId, name: &str) -> Result<EdgeCapability<C>> {
        let resource = self
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownResource(id.to_string()))?;
        let pos = resource
            .capabilities
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| RegistryError::UnknownCapability {
                resource: resource.identity.clone(),
                capability: name.to_string(),
            })?;
        info!(identity = %resource.identity, capability = name, "capability removed");
        Ok(resource.capabilities.remove(pos))
    }

    pub fn find_capability(&self, id: ResourceId, name: &str) -> Option<&EdgeCapability<C>> {
        self.get(id)?.capability(name)
    }
}
