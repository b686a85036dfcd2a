//! Root-curated trust priors.
//!
//! A stereotype gives a starting belief about edges whose certificate
//! carries a given tag set, for use while direct history is thin.

use edgetrust_identity::CertificateTags;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::codec::{element, from_value, to_value, TrustRecord};
use crate::distributions::BetaDistribution;
use crate::error::DecodeError;
use crate::model::EdgeResourceTrust;

#[derive(Debug, Clone, PartialEq)]
pub struct Stereotype {
    pub tags: CertificateTags,
    /// Prior for the per-edge distributions
    pub edge: EdgeResourceTrust,
    /// Result-quality prior per capability name
    pub capabilities: BTreeMap<String, BetaDistribution>,
}

impl Stereotype {
    pub fn new(tags: CertificateTags, edge: EdgeResourceTrust) -> Self {
        Self {
            tags,
            edge,
            capabilities: BTreeMap::new(),
        }
    }

    pub fn with_capability(mut self, name: &str, result_quality: BetaDistribution) -> Self {
        self.capabilities.insert(name.to_string(), result_quality);
        self
    }

    pub fn result_quality(&self, capability: &str) -> Option<&BetaDistribution> {
        self.capabilities.get(capability)
    }
}

impl fmt::Display for Stereotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stereotype(tags={},{})", self.tags, self.edge)
    }
}

/// `[tags, [task_submission, task_result], {capability: result_quality}]`
impl TrustRecord for Stereotype {
    const ARITY: usize = 3;

    fn to_elements(&self) -> Vec<Value> {
        let capabilities: Map<String, Value> = self
            .capabilities
            .iter()
            .map(|(name, beta)| (name.clone(), json!(beta)))
            .collect();
        vec![
            json!(self.tags.bits()),
            to_value(&self.edge),
            Value::Object(capabilities),
        ]
    }

    fn from_elements(elements: Vec<Value>) -> Result<Self, DecodeError> {
        let found = elements.len();
        let [tags, edge, capabilities]: [Value; 3] = elements
            .try_into()
            .map_err(|_| DecodeError::Arity { expected: Self::ARITY, found })?;
        Ok(Self {
            tags: CertificateTags(element(tags)?),
            edge: from_value(edge)?,
            capabilities: element(capabilities)?,
        })
    }
}

/// Stereotypes keyed by exact certificate tag set.
#[derive(Debug, Clone, Default)]
pub struct StereotypeTable {
    entries: HashMap<CertificateTags, Stereotype>,
}

impl StereotypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the stereotype for its tag set.
    pub fn insert(&mut self, stereotype: Stereotype) -> Option<Stereotype> {
        self.entries.insert(stereotype.tags, stereotype)
    }

    pub fn find(&self, tags: &CertificateTags) -> Option<&Stereotype> {
        self.entries.get(tags)
    }

    pub fn remove(&mut self, tags: &CertificateTags) -> Option<Stereotype> {
        self.entries.remove(tags)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
