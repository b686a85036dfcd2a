//! Bayesian trust in edge resources.
//!
//! Interaction outcomes feed Beta (success/failure) and Gaussian (throughput)
//! distributions held per edge and per capability in the edge registry. The
//! [`TrustEngine`] turns them into a single weighted value per capability,
//! optionally pooled with a stereotype prior chosen by certificate tags.
//!
//! Two capability models exist: [`BaselineCapability`] tracks result quality
//! only, [`ThroughputCapability`] also tracks inbound/outbound throughput.
//! A node is composed with exactly one of them.

pub mod codec;
pub mod distributions;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;
pub mod outcome;
pub mod pooling;
pub mod stereotype;

pub use codec::{deserialize, serialize, TrustRecord};
pub use distributions::{BetaDistribution, GaussianDistribution};
pub use engine::{Edge, TrustEngine, TrustRegistry};
pub use error::{DecodeError, Result, TrustError};
pub use metrics::{TrustMetric, TrustWeights, WEIGHT_SUM_TOLERANCE};
pub use model::{
    goodness_of_throughput, BaselineCapability, CapabilityModel, EdgeResourceTrust,
    ThroughputCapability, ThroughputThreshold,
};
pub use outcome::{
    ChallengeResponseOutcome, PingAction, TaskResultOutcome, TaskSubmissionOutcome,
    ThroughputDirection,
};
pub use pooling::{BetaPooling, EvidencePooling, PseudoCountSum};
pub use stereotype::{Stereotype, StereotypeTable};

/// Engine scoring the result-quality-only model.
pub type BaselineEngine = TrustEngine<BaselineCapability>;
/// Engine scoring the model that also tracks throughput.
pub type ThroughputEngine = TrustEngine<ThroughputCapability>;
