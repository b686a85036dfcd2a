//! Trust value computation and outcome bookkeeping.

use edgetrust_core::{current_timestamp_ms, TrustConfig};
use edgetrust_edge::{EdgeCapability, EdgeRegistry, EdgeResource, ResourceId};
use edgetrust_identity::KeyStoreHandle;
use std::collections::HashMap;
use std::marker::PhantomData;
use tracing::{debug, error, info, warn};

use crate::codec::{deserialize, serialize};
use crate::distributions::BetaDistribution;
use crate::error::{Result, TrustError};
use crate::metrics::{weights_sum_to_one, TrustMetric, TrustWeights};
use crate::model::{goodness_of_throughput, CapabilityModel, EdgeResourceTrust, ThroughputThreshold};
use crate::outcome::{
    ChallengeResponseOutcome, PingAction, TaskResultOutcome, TaskSubmissionOutcome,
    ThroughputDirection,
};
use crate::pooling::{BetaPooling, EvidencePooling};
use crate::stereotype::{Stereotype, StereotypeTable};

/// Registry whose entries carry trust records of model `C`.
pub type TrustRegistry<C> = EdgeRegistry<EdgeResourceTrust, C>;
/// One registered edge with its trust records.
pub type Edge<C> = EdgeResource<EdgeResourceTrust, C>;

/// Computes trust values for one capability model.
///
/// The engine holds configuration only; statistics live in the registry.
pub struct TrustEngine<C> {
    keystore: KeyStoreHandle,
    weights: TrustWeights,
    stereotypes: StereotypeTable,
    thresholds: HashMap<String, ThroughputThreshold>,
    pooling: Box<dyn BetaPooling>,
    challenge_response: Option<String>,
    _model: PhantomData<fn() -> C>,
}

impl<C: CapabilityModel> TrustEngine<C> {
    pub fn new(keystore: KeyStoreHandle, weights: TrustWeights) -> Self {
        Self {
            keystore,
            weights,
            stereotypes: StereotypeTable::new(),
            thresholds: HashMap::new(),
            pooling: Box::new(EvidencePooling),
            challenge_response: None,
            _model: PhantomData,
        }
    }

    pub fn from_config(keystore: KeyStoreHandle, config: &TrustConfig) -> Self {
        if config.model != C::KIND {
            warn!(configured = ?config.model, built = ?C::KIND, "trust model mismatch");
        }
        let mut engine = Self::new(keystore, TrustWeights::from_config(&config.applications));
        engine.challenge_response = config.challenge_response_capability.clone();
        for t in &config.throughput_thresholds {
            let threshold = ThroughputThreshold {
                inbound: t.inbound,
                outbound: t.outbound,
            };
            if let Err(e) = engine.set_throughput_threshold(&t.capability, threshold) {
                error!(error = %e, "throughput thresholds ignored");
            }
        }
        engine
    }

    pub fn with_pooling(mut self, pooling: impl BetaPooling + 'static) -> Self {
        self.pooling = Box::new(pooling);
        self
    }

    pub fn with_challenge_response(mut self, capability: &str) -> Self {
        self.challenge_response = Some(capability.to_string());
        self
    }

    /// Both thresholds must be positive.
    pub fn set_throughput_threshold(
        &mut self,
        capability: &str,
        threshold: ThroughputThreshold,
    ) -> Result<()> {
        if !(threshold.inbound > 0.0 && threshold.outbound > 0.0) {
            return Err(TrustError::InvalidThreshold {
                capability: capability.to_string(),
                inbound: threshold.inbound,
                outbound: threshold.outbound,
            });
        }
        self.thresholds.insert(capability.to_string(), threshold);
        Ok(())
    }

    pub fn weights(&self) -> &TrustWeights {
        &self.weights
    }

    pub fn stereotypes(&self) -> &StereotypeTable {
        &self.stereotypes
    }

    pub fn stereotypes_mut(&mut self) -> &mut StereotypeTable {
        &mut self.stereotypes
    }

    /// Stereotype matching the tags of the edge's verified certificate.
    pub fn stereotype_for(&self, edge: &Edge<C>) -> Option<&Stereotype> {
        let tags = self.keystore.tags_for_address(&edge.address())?;
        self.stereotypes.find(&tags)
    }

    fn expected(&self, local: &BetaDistribution, prior: Option<&BetaDistribution>) -> f64 {
        match prior {
            Some(prior) => self.pooling.pool(local, prior).expected(),
            None => local.expected(),
        }
    }

    /// Weighted trust in `edge` for work on `capability`.
    ///
    /// Not clamped; a weight table that does not sum to 1 is only logged.
    pub fn calculate_trust(&self, edge: &Edge<C>, capability: &EdgeCapability<C>) -> f64 {
        let application = capability.name();
        let stereotype = self.stereotype_for(edge);

        let mut trust = 0.0;
        let mut total_weight = 0.0;
        let mut accumulate = |metric: TrustMetric, value: f64| {
            let w = self.weights.weight(application, metric);
            trust += w * value;
            total_weight += w;
        };

        accumulate(
            TrustMetric::TaskSubmission,
            self.expected(
                &edge.trust.task_submission,
                stereotype.map(|s| &s.edge.task_submission),
            ),
        );
        accumulate(
            TrustMetric::TaskResult,
            self.expected(&edge.trust.task_result, stereotype.map(|s| &s.edge.task_result)),
        );
        accumulate(
            TrustMetric::ResultQuality,
            self.expected(
                capability.trust.result_quality(),
                stereotype.and_then(|s| s.result_quality(application)),
            ),
        );

        if let Some((inbound, outbound)) = capability.trust.throughput() {
            match self.thresholds.get(application) {
                Some(threshold) => accumulate(
                    TrustMetric::Throughput,
                    goodness_of_throughput(inbound, outbound, threshold),
                ),
                None if self.weights.weight(application, TrustMetric::Throughput) != 0.0 => {
                    error!(capability = application, "no throughput thresholds configured");
                }
                None => {}
            }
        }

        if let Some(cr_name) = self.challenge_response.as_deref() {
            if cr_name != application {
                if let Some(cr) = edge.capability(cr_name) {
                    accumulate(
                        TrustMetric::ChallengeResponse,
                        cr.trust.result_quality().expected(),
                    );
                }
            }
        }

        if !weights_sum_to_one(total_weight) {
            warn!(
                capability = application,
                total = total_weight,
                "trust weights should total close to 1"
            );
        }

        debug!(
            edge = edge.identity(),
            capability = application,
            stereotype = stereotype.is_some(),
            trust,
            "calculated trust"
        );
        trust
    }

    /// [`calculate_trust`](Self::calculate_trust) by registry id and capability name.
    pub fn calculate_for(
        &self,
        registry: &TrustRegistry<C>,
        id: ResourceId,
        capability: &str,
    ) -> Option<f64> {
        let edge = registry.get(id)?;
        let cap = edge.capability(capability)?;
        Some(self.calculate_trust(edge, cap))
    }

    /// Returns whether the outcome was recorded.
    pub fn update_task_submission(
        &self,
        edge: &mut Edge<C>,
        capability: &str,
        outcome: TaskSubmissionOutcome,
    ) -> bool {
        let Some(good) = outcome.evidence() else {
            debug!(edge = edge.identity(), capability, ?outcome, "task submission outcome discarded");
            return false;
        };
        let before = edge.trust.task_submission;
        edge.trust.task_submission.record(good);
        info!(
            edge = edge.identity(),
            capability,
            ?outcome,
            "task_submission {} -> {}",
            before,
            edge.trust.task_submission
        );
        true
    }

    pub fn update_task_result(
        &self,
        edge: &mut Edge<C>,
        capability: &str,
        outcome: TaskResultOutcome,
    ) {
        let before = edge.trust.task_result;
        edge.trust
            .task_result
            .record(outcome == TaskResultOutcome::Delivered);
        info!(
            edge = edge.identity(),
            capability,
            ?outcome,
            "task_result {} -> {}",
            before,
            edge.trust.task_result
        );
    }

    pub fn update_result_quality(
        &self,
        edge: &mut Edge<C>,
        capability: &str,
        good: bool,
    ) -> Result<()> {
        let identity = edge.identity().to_string();
        let cap = capability_mut(edge, capability)?;
        let before = *cap.trust.result_quality();
        cap.trust.result_quality_mut().record(good);
        info!(
            edge = %identity,
            capability,
            good,
            "result_quality {} -> {}",
            before,
            cap.trust.result_quality()
        );
        Ok(())
    }

    /// Returns false if the model does not track throughput.
    pub fn update_throughput(
        &self,
        edge: &mut Edge<C>,
        capability: &str,
        direction: ThroughputDirection,
        bytes_per_tick: f64,
    ) -> Result<bool> {
        let identity = edge.identity().to_string();
        let cap = capability_mut(edge, capability)?;
        let recorded = cap.trust.record_throughput(direction, bytes_per_tick);
        if recorded {
            info!(edge = %identity, capability, ?direction, bytes_per_tick, "throughput now {}", cap.trust);
        }
        Ok(recorded)
    }

    pub fn update_ping(&self, edge: &mut Edge<C>, action: PingAction) {
        if action == PingAction::Received {
            let before = edge.trust.last_ping_response;
            let now = current_timestamp_ms();
            edge.trust.last_ping_response = Some(now);
            info!(edge = edge.identity(), ?before, now, "last ping updated");
        }
    }

    /// Credit or debit the challenge-response capability's result quality.
    pub fn update_challenge_response(
        &self,
        edge: &mut Edge<C>,
        outcome: ChallengeResponseOutcome,
    ) -> Result<bool> {
        let Some(good) = outcome.evidence() else {
            debug!(edge = edge.identity(), ?outcome, "challenge response outcome discarded");
            return Ok(false);
        };
        let Some(cr_name) = self.challenge_response.as_deref() else {
            error!("no challenge-response capability configured");
            return Err(TrustError::UnknownCapability {
                edge: edge.identity().to_string(),
                capability: String::new(),
            });
        };
        if let Err(e) = self.update_result_quality(edge, cr_name, good) {
            error!(error = %e, "failed to find challenge-response capability");
            return Err(e);
        }
        Ok(true)
    }

    pub fn serialize_edge(&self, edge: &Edge<C>) -> Vec<u8> {
        serialize(&edge.trust)
    }

    pub fn serialize_capability(&self, capability: &EdgeCapability<C>) -> Vec<u8> {
        serialize(&capability.trust)
    }

    /// Replace an edge's persisted statistics. Nothing changes on error.
    pub fn restore_edge(&self, edge: &mut Edge<C>, bytes: &[u8]) -> Result<()> {
        let restored: EdgeResourceTrust = deserialize(bytes)?;
        edge.trust.task_submission = restored.task_submission;
        edge.trust.task_result = restored.task_result;
        Ok(())
    }

    pub fn restore_capability(&self, edge: &mut Edge<C>, capability: &str, bytes: &[u8]) -> Result<()> {
        let restored: C = deserialize(bytes)?;
        capability_mut(edge, capability)?.trust = restored;
        Ok(())
    }
}

fn capability_mut<'a, C>(edge: &'a mut Edge<C>, capability: &str) -> Result<&'a mut EdgeCapability<C>> {
    let identity = edge.identity().to_string();
    edge.capability_mut(capability)
        .ok_or_else(|| TrustError::UnknownCapability {
            edge: identity,
            capability: capability.to_string(),
        })
}
