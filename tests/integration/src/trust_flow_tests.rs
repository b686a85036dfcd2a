//! Verified certificates seeding trust through stereotypes

use crate::test_utils::*;
use edgetrust_core::{NodeConfig, ResponseCode, TrustModelKind};
use edgetrust_edge::{EdgeRegistry, RegistryLimits};
use edgetrust_identity::{CertificateOrigin, CertificateTags};
use edgetrust_trust::{
    BaselineCapability, BaselineEngine, BetaDistribution, ChallengeResponseOutcome,
    EdgeResourceTrust, Stereotype, TaskResultOutcome, TaskSubmissionOutcome,
    ThroughputCapability, ThroughputDirection, ThroughputEngine, TrustEngine, TrustRegistry,
};

const LOCAL: &str = "fd00::212:4b00:0:1";
const EDGE: &str = "fd00::212:4b00:0:20";
const CR: &str = "challenge-resp";

fn limits() -> RegistryLimits {
    RegistryLimits::from(&NodeConfig::default_config().registry)
}

fn optimistic_edge_stereotype() -> Stereotype {
    Stereotype::new(
        CertificateTags::EDGE,
        EdgeResourceTrust {
            task_submission: BetaDistribution::new(20.0, 2.0),
            task_result: BetaDistribution::new(20.0, 2.0),
            last_ping_response: None,
        },
    )
    .with_capability("routing", BetaDistribution::new(10.0, 1.0))
}

#[tokio::test]
async fn test_verified_edge_scored_with_stereotype() {
    let root = root_authority();
    let local = TestNode::new(&root, LOCAL, 4);
    let edge = TestNode::new(&root, EDGE, 4);

    let config = NodeConfig::default_config();
    let mut engine = BaselineEngine::from_config(local.store.clone(), &config.trust);
    engine.stereotypes_mut().insert(optimistic_edge_stereotype());

    let mut registry: TrustRegistry<BaselineCapability> = EdgeRegistry::new(limits());
    let id = registry.add(edge.address, "edge-20").unwrap().id();
    registry.add_capability(id, "routing").unwrap();

    // no verified certificate yet: uniform priors only
    let unverified = engine.calculate_for(&registry, id, "routing").unwrap();
    assert!((unverified - 0.5 * 0.99999).abs() < 1e-9);

    local
        .store
        .add(edge.certificate(&root, CertificateTags::EDGE), CertificateOrigin::Unsolicited)
        .unwrap();
    local.pipeline.drain().await;

    let seeded = engine.calculate_for(&registry, id, "routing").unwrap();
    assert!(seeded > 0.85, "stereotype should lift trust, got {}", seeded);

    // a run of failures pulls it back down
    let resource = registry.get_mut(id).unwrap();
    for _ in 0..30 {
        engine.update_task_submission(
            resource,
            "routing",
            TaskSubmissionOutcome::Response(ResponseCode::INTERNAL_SERVER_ERROR),
        );
        engine.update_task_result(resource, "routing", TaskResultOutcome::Missing);
        engine.update_result_quality(resource, "routing", false).unwrap();
    }
    let punished = engine.calculate_for(&registry, id, "routing").unwrap();
    assert!(punished < 0.5, "got {}", punished);
}

#[tokio::test]
async fn test_untagged_certificate_gets_no_stereotype() {
    let root = root_authority();
    let local = TestNode::new(&root, LOCAL, 4);
    let edge = TestNode::new(&root, EDGE, 4);

    let mut engine = BaselineEngine::from_config(local.store.clone(), &NodeConfig::default_config().trust);
    engine.stereotypes_mut().insert(optimistic_edge_stereotype());

    local
        .store
        .add(edge.certificate(&root, CertificateTags::NONE), CertificateOrigin::Unsolicited)
        .unwrap();
    local.pipeline.drain().await;

    let mut registry: TrustRegistry<BaselineCapability> = EdgeRegistry::new(limits());
    let id = registry.add(edge.address, "edge-20").unwrap().id();
    registry.add_capability(id, "routing").unwrap();

    assert!(engine.stereotype_for(registry.get(id).unwrap()).is_none());
}

#[test]
fn test_challenge_response_lowers_other_capabilities() {
    let root = root_authority();
    let local = TestNode::new(&root, LOCAL, 4);

    let mut config = NodeConfig::default_config();
    config.trust.applications[0]
        .weights
        .insert("task_submission".into(), 0.5);
    config.trust.applications[0]
        .weights
        .insert("challenge_response".into(), 0.5);
    let engine = BaselineEngine::from_config(local.store.clone(), &config.trust);

    let mut registry: TrustRegistry<BaselineCapability> = EdgeRegistry::new(limits());
    let id = registry.add(EDGE.parse().unwrap(), "edge-20").unwrap().id();
    registry.add_capability(id, "monitoring").unwrap();
    registry.add_capability(id, CR).unwrap();

    let before = engine.calculate_for(&registry, id, "monitoring").unwrap();
    let resource = registry.get_mut(id).unwrap();
    for _ in 0..4 {
        engine
            .update_challenge_response(resource, ChallengeResponseOutcome::Incorrect)
            .unwrap();
    }
    let after = engine.calculate_for(&registry, id, "monitoring").unwrap();
    assert!(after < before);
    assert_eq!(
        registry.find_capability(id, CR).unwrap().trust.result_quality,
        BetaDistribution::new(1.0, 5.0)
    );
}

#[test]
fn test_throughput_model_from_config() {
    let root = root_authority();
    let local = TestNode::new(&root, LOCAL, 4);

    let config = NodeConfig::from_toml_str(
        r#"
[node]
subject = "00124b0000000001"
address = "fd00::212:4b00:0:1"
private_key = ""
root_address = "fd00::1"
root_public_key = ""

[trust]
model = "throughput"

[[trust.applications]]
application = "monitoring"
weights = { task_submission = 0.5, throughput = 0.5 }

[[trust.throughput_thresholds]]
capability = "monitoring"
inbound = 50.0
outbound = 50.0
"#,
    )
    .unwrap();
    assert_eq!(config.trust.model, TrustModelKind::Throughput);

    let engine: ThroughputEngine = TrustEngine::from_config(local.store.clone(), &config.trust);
    let mut registry: TrustRegistry<ThroughputCapability> = EdgeRegistry::new(limits());
    let id = registry.add(EDGE.parse().unwrap(), "edge-20").unwrap().id();
    registry.add_capability(id, "monitoring").unwrap();

    let resource = registry.get_mut(id).unwrap();
    engine
        .update_throughput(resource, "monitoring", ThroughputDirection::Out, 25.0)
        .unwrap();
    // outbound-only and short of its threshold
    assert_eq!(engine.calculate_for(&registry, id, "monitoring"), Some(0.25));

    let resource = registry.get_mut(id).unwrap();
    engine
        .update_throughput(resource, "monitoring", ThroughputDirection::Out, 125.0)
        .unwrap();
    assert_eq!(engine.calculate_for(&registry, id, "monitoring"), Some(0.75));
}

#[test]
fn test_statistics_survive_restore() {
    let root = root_authority();
    let local = TestNode::new(&root, LOCAL, 4);
    let engine = BaselineEngine::from_config(local.store.clone(), &NodeConfig::default_config().trust);

    let mut registry: TrustRegistry<BaselineCapability> = EdgeRegistry::new(limits());
    let id = registry.add(EDGE.parse().unwrap(), "edge-20").unwrap().id();
    registry.add_capability(id, "routing").unwrap();
    let resource = registry.get_mut(id).unwrap();
    engine.update_task_result(resource, "routing", TaskResultOutcome::Delivered);
    engine.update_result_quality(resource, "routing", true).unwrap();
    let saved_edge = engine.serialize_edge(resource);
    let saved_cap = engine.serialize_capability(resource.capability("routing").unwrap());
    let score = engine.calculate_for(&registry, id, "routing").unwrap();

    // a fresh registry, as after a reboot
    let mut restored: TrustRegistry<BaselineCapability> = EdgeRegistry::new(limits());
    let id = restored.add(EDGE.parse().unwrap(), "edge-20").unwrap().id();
    restored.add_capability(id, "routing").unwrap();
    let resource = restored.get_mut(id).unwrap();
    engine.restore_edge(resource, &saved_edge).unwrap();
    engine.restore_capability(resource, "routing", &saved_cap).unwrap();

    assert_eq!(engine.calculate_for(&restored, id, "routing"), Some(score));
}
