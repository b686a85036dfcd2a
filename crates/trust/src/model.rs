//! Trust records embedded in the Edge Registry, and the two capability models.
//!
//! Both models share [`EdgeResourceTrust`]; they differ only in what a
//! capability tracks. The baseline model keeps result quality alone, the
//! throughput model adds inbound and outbound throughput.

use edgetrust_core::TrustModelKind;
use serde_json::{json, Value};
use std::fmt;

use crate::codec::{element, TrustRecord};
use crate::distributions::{BetaDistribution, GaussianDistribution};
use crate::error::DecodeError;
use crate::outcome::ThroughputDirection;

/// Per-edge statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeResourceTrust {
    /// Did the edge accept submitted tasks
    pub task_submission: BetaDistribution,
    /// Did results arrive when expected
    pub task_result: BetaDistribution,
    /// Last ping response, milliseconds since the epoch. Not persisted.
    pub last_ping_response: Option<u64>,
}

impl fmt::Display for EdgeResourceTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EdgeResourceTM(TaskSub={},TaskRes={})",
            self.task_submission, self.task_result
        )
    }
}

impl TrustRecord for EdgeResourceTrust {
    const ARITY: usize = 2;

    fn to_elements(&self) -> Vec<Value> {
        vec![json!(self.task_submission), json!(self.task_result)]
    }

    fn from_elements(elements: Vec<Value>) -> Result<Self, DecodeError> {
        let found = elements.len();
        let [submission, result]: [Value; 2] = elements
            .try_into()
            .map_err(|_| DecodeError::Arity { expected: Self::ARITY, found })?;
        Ok(Self {
            task_submission: element(submission)?,
            task_result: element(result)?,
            last_ping_response: None,
        })
    }
}

/// Per-capability statistics of a trust model.
pub trait CapabilityModel:
    TrustRecord + Default + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const KIND: TrustModelKind;

    fn result_quality(&self) -> &BetaDistribution;

    fn result_quality_mut(&mut self) -> &mut BetaDistribution;

    /// `(inbound, outbound)` if the model tracks throughput.
    fn throughput(&self) -> Option<(&GaussianDistribution, &GaussianDistribution)> {
        None
    }

    /// Record a throughput sample. Returns false if the model ignores throughput.
    fn record_throughput(&mut self, _direction: ThroughputDirection, _bytes_per_tick: f64) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineCapability {
    pub result_quality: BetaDistribution,
}

impl fmt::Display for BaselineCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeCapTM(ResQual={})", self.result_quality)
    }
}

impl TrustRecord for BaselineCapability {
    const ARITY: usize = 1;

    fn to_elements(&self) -> Vec<Value> {
        vec![json!(self.result_quality)]
    }

    fn from_elements(elements: Vec<Value>) -> Result<Self, DecodeError> {
        let first = elements
            .into_iter()
            .next()
            .ok_or(DecodeError::Arity { expected: Self::ARITY, found: 0 })?;
        Ok(Self {
            result_quality: element(first)?,
        })
    }
}

impl CapabilityModel for BaselineCapability {
    const KIND: TrustModelKind = TrustModelKind::Baseline;

    fn result_quality(&self) -> &BetaDistribution {
        &self.result_quality
    }

    fn result_quality_mut(&mut self) -> &mut BetaDistribution {
        &mut self.result_quality
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThroughputCapability {
    pub result_quality: BetaDistribution,
    pub throughput_in: GaussianDistribution,
    pub throughput_out: GaussianDistribution,
}

impl fmt::Display for ThroughputCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EdgeCapTM(ResQual={},ThroughputIn={},ThroughputOut={})",
            self.result_quality, self.throughput_in, self.throughput_out
        )
    }
}

impl TrustRecord for ThroughputCapability {
    const ARITY: usize = 3;

    fn to_elements(&self) -> Vec<Value> {
        vec![
            json!(self.result_quality),
            json!(self.throughput_in),
            json!(self.throughput_out),
        ]
    }

    fn from_elements(elements: Vec<Value>) -> Result<Self, DecodeError> {
        let found = elements.len();
        let [rq, tin, tout]: [Value; 3] = elements
            .try_into()
            .map_err(|_| DecodeError::Arity { expected: Self::ARITY, found })?;
        Ok(Self {
            result_quality: element(rq)?,
            throughput_in: element(tin)?,
            throughput_out: element(tout)?,
        })
    }
}

impl CapabilityModel for ThroughputCapability {
    const KIND: TrustModelKind = TrustModelKind::Throughput;

    fn result_quality(&self) -> &BetaDistribution {
        &self.result_quality
    }

    fn result_quality_mut(&mut self) -> &mut BetaDistribution {
        &mut self.result_quality
    }

    fn throughput(&self) -> Option<(&GaussianDistribution, &GaussianDistribution)> {
        Some((&self.throughput_in, &self.throughput_out))
    }

    fn record_throughput(&mut self, direction: ThroughputDirection, bytes_per_tick: f64) -> bool {
        match direction {
            ThroughputDirection::In => self.throughput_in.update(bytes_per_tick),
            ThroughputDirection::Out => self.throughput_out.update(bytes_per_tick),
        }
        true
    }
}

/// Minimum acceptable mean throughput per direction for one capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputThreshold {
    pub inbound: f64,
    pub outbound: f64,
}

/// Score observed throughput against `threshold`, in `[0, 1]`.
///
/// With no samples the edge gets the benefit of the doubt. With one
/// direction sampled the score is all or nothing. With both sampled, a
/// shortfall scales the score by the failing direction's ratio; outbound is
/// checked first.
pub fn goodness_of_throughput(
    inbound: &GaussianDistribution,
    outbound: &GaussianDistribution,
    threshold: &ThroughputThreshold,
) -> f64 {
    debug_assert!(
        threshold.inbound > 0.0 && threshold.outbound > 0.0,
        "non-positive throughput threshold {:?}",
        threshold
    );
    let meets = |d: &GaussianDistribution, t: f64| if d.mean() >= t { 1.0 } else { 0.0 };

    match (inbound.is_empty(), outbound.is_empty()) {
        (true, true) => 1.0,
        (true, false) => meets(outbound, threshold.outbound),
        (false, true) => meets(inbound, threshold.inbound),
        (false, false) => {
            let in_ok = inbound.mean() >= threshold.inbound;
            let out_ok = outbound.mean() >= threshold.outbound;
            if in_ok && out_ok {
                1.0
            } else if !out_ok {
                outbound.mean() / threshold.outbound
            } else {
                inbound.mean() / threshold.inbound
            }
        }
    }
}
