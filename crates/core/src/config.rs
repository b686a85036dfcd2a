//! Configuration management for EdgeTrust nodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv6Addr;
#[cfg(feature = "toml")]
use std::path::Path;
#[cfg(feature = "toml")]
use tracing::debug;

use crate::error::CoreError;
use crate::logging::LogFormat;
use crate::types::MAX_CAPABILITY_NAME_LENGTH;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,
    #[serde(default)]
    pub keystore: KeystoreConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub trust: TrustConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSection {
    /// Hex encoded EUI-64 of this node
    pub subject: String,
    pub address: Ipv6Addr,
    /// Hex encoded P-256 private scalar
    pub private_key: String,
    /// Address of the root/key server
    pub root_address: Ipv6Addr,
    /// Hex encoded uncompressed (x || y) root public key
    pub root_public_key: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    pub capacity: usize,
    pub request_timeout_secs: u64,
    /// Also derive a security context for certificates that arrived unsolicited
    pub derive_for_unsolicited: bool,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            request_timeout_secs: 60,
            derive_for_unsolicited: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub edge_capacity: usize,
    pub capability_capacity: usize,
    pub capabilities_per_edge: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            edge_capacity: 4,
            capability_capacity: 12,
            capabilities_per_edge: 4,
        }
    }
}

/// Which scoring strategy the node is composed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustModelKind {
    #[default]
    Baseline,
    Throughput,
}

/// Per-application weight table, keyed by metric name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationWeights {
    pub application: String,
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThroughputThresholdConfig {
    pub capability: String,
    pub inbound: f64,
    pub outbound: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    #[serde(default)]
    pub model: TrustModelKind,
    pub challenge_response_capability: Option<String>,
    #[serde(default)]
    pub applications: Vec<ApplicationWeights>,
    #[serde(default)]
    pub throughput_thresholds: Vec<ThroughputThresholdConfig>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        let third = 0.33333;
        Self {
            model: TrustModelKind::Baseline,
            challenge_response_capability: Some("challenge-resp".to_string()),
            applications: vec![
                ApplicationWeights {
                    application: "monitoring".to_string(),
                    weights: BTreeMap::from([("task_submission".to_string(), 1.0)]),
                },
                ApplicationWeights {
                    application: "routing".to_string(),
                    weights: BTreeMap::from([
                        ("task_submission".to_string(), third),
                        ("task_result".to_string(), third),
                        ("result_quality".to_string(), third),
                    ]),
                },
            ],
            throughput_thresholds: Vec::new(),
        }
    }
}

/// Capability names must fit the edge registry's name bound.
fn check_capability_name(field: &str, name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.len() > MAX_CAPABILITY_NAME_LENGTH {
        return Err(CoreError::Config(format!(
            "{}: capability name {:?} must be 1 to {} bytes",
            field, name, MAX_CAPABILITY_NAME_LENGTH
        )));
    }
    Ok(())
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let config: Self = toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        debug!(
            subject = %config.node.subject,
            model = ?config.trust.model,
            applications = config.trust.applications.len(),
            "configuration parsed"
        );
        Ok(config)
    }

    /// Reject configurations that cannot be composed into a node.
    ///
    /// Weight tables that do not sum to 1 are accepted here; the trust engine
    /// only warns about them.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.keystore.capacity == 0 {
            return Err(CoreError::Config("keystore.capacity must be non-zero".into()));
        }
        if self.registry.edge_capacity == 0 {
            return Err(CoreError::Config("registry.edge_capacity must be non-zero".into()));
        }
        if let Some(name) = &self.trust.challenge_response_capability {
            check_capability_name("trust.challenge_response_capability", name)?;
        }
        for app in &self.trust.applications {
            check_capability_name("trust.applications", &app.application)?;
        }
        for t in &self.trust.throughput_thresholds {
            check_capability_name("trust.throughput_thresholds", &t.capability)?;
            if !(t.inbound > 0.0 && t.outbound > 0.0) {
                return Err(CoreError::Config(format!(
                    "throughput thresholds for {} must be positive",
                    t.capability
                )));
            }
        }
        Ok(())
    }

    pub fn default_config() -> Self {
        Self {
            node: NodeSection {
                subject: "00124b0000000001".to_string(),
                address: Ipv6Addr::new(0xfd00, 0, 0, 0, 0x0212, 0x4b00, 0, 1),
                private_key: String::new(),
                root_address: Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1),
                root_public_key: String::new(),
                log_level: default_log_level(),
                log_format: LogFormat::Plain,
            },
            keystore: KeystoreConfig::default(),
            registry: RegistryConfig::default(),
            trust: TrustConfig::default(),
        }
    }
}
