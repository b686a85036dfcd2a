use anyhow::{bail, Context, Result};
use edgetrust_core::{logging, Eui64, NodeConfig, TrustModelKind};
use edgetrust_crypto::{CryptoBackend, PublicKeyBytes, SoftwareCrypto};
use edgetrust_edge::{EdgeRegistry, RegistryLimits};
use edgetrust_identity::{KeyStore, KeyStoreHandle, VerificationPipeline};
use edgetrust_trust::{BaselineCapability, CapabilityModel, ThroughputCapability, TrustEngine, TrustRegistry};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;
const STATUS_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config_path = parse_config_path(&args)?;
    let config = NodeConfig::from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    logging::init(config.node.log_format, &config.node.log_level);

    let subject: Eui64 = config.node.subject.parse().context("invalid node subject")?;
    let backend = Arc::new(
        SoftwareCrypto::from_private_key_hex(&config.node.private_key)
            .context("invalid node private key")?,
    );
    let root_key = PublicKeyBytes::from_hex(&config.node.root_public_key)
        .context("invalid root public key")?;

    let store = KeyStoreHandle::new(KeyStore::new(
        config.keystore.capacity,
        config.node.root_address,
        root_key,
    ));

    let pipeline = VerificationPipeline::new(store.clone(), backend.clone(), subject)
        .derive_for_unsolicited(config.keystore.derive_for_unsolicited);
    let pipeline_task = tokio::spawn(pipeline.run());

    info!(
        %subject,
        address = %config.node.address,
        root = %config.node.root_address,
        public_key = %hex::encode(backend.local_public_key().as_bytes()),
        model = ?config.trust.model,
        "edgetrust node started"
    );

    let result = match config.trust.model {
        TrustModelKind::Baseline => serve::<BaselineCapability>(&config, store).await,
        TrustModelKind::Throughput => serve::<ThroughputCapability>(&config, store).await,
    };

    pipeline_task.abort();
    info!("edgetrust node stopped");
    result
}

/// Compose the trust side for model `C` and run until interrupted.
async fn serve<C: CapabilityModel>(config: &NodeConfig, store: KeyStoreHandle) -> Result<()> {
    let registry: TrustRegistry<C> = EdgeRegistry::new(RegistryLimits::from(&config.registry));
    let engine = TrustEngine::<C>::from_config(store.clone(), &config.trust);

    for application in engine.weights().applications() {
        info!(application, "trust weights loaded");
    }
    if config.trust.challenge_response_capability.is_none() {
        warn!("no challenge-response capability configured");
    }

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            _ = status.tick() => {
                let (verified, pending) = store.read(|s| (s.verified_count(), s.pending_count()));
                info!(
                    verified,
                    pending,
                    capacity = config.keystore.capacity,
                    edges = registry.len(),
                    "status"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for shutdown signal")?;
                info!("shutdown requested");
                return Ok(());
            }
        }
    }
}

fn parse_config_path(args: &[String]) -> Result<PathBuf> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(PathBuf::from(path));
            }
            bail!("--config was provided without a path");
        }
    }

    bail!("missing required --config <path> argument")
}
