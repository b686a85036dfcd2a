//! Merging a local Beta distribution with a stereotype prior.
//!
//! Both strategies are commutative. Which one a node uses is fixed when the
//! engine is built.

use crate::distributions::BetaDistribution;

/// Smallest pseudo-count a pooled parameter may take.
const MIN_PSEUDO_COUNT: f64 = 1e-6;

pub trait BetaPooling: Send + Sync {
    fn pool(&self, local: &BetaDistribution, prior: &BetaDistribution) -> BetaDistribution;

    fn name(&self) -> &'static str;
}

/// Adds the evidence of both distributions, counting the shared uniform
/// prior once: `(a1 + a2 - 1, b1 + b2 - 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidencePooling;

impl BetaPooling for EvidencePooling {
    fn pool(&self, local: &BetaDistribution, prior: &BetaDistribution) -> BetaDistribution {
        BetaDistribution::new(
            (local.alpha + prior.alpha - 1.0).max(MIN_PSEUDO_COUNT),
            (local.beta + prior.beta - 1.0).max(MIN_PSEUDO_COUNT),
        )
    }

    fn name(&self) -> &'static str {
        "evidence"
    }
}

/// Plain sum of pseudo-counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PseudoCountSum;

impl BetaPooling for PseudoCountSum {
    fn pool(&self, local: &BetaDistribution, prior: &BetaDistribution) -> BetaDistribution {
        BetaDistribution::new(local.alpha + prior.alpha, local.beta + prior.beta)
    }

    fn name(&self) -> &'static str {
        "sum"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uniform_is_identity_for_evidence_pooling() {
        let local = BetaDistribution::new(4.0, 2.0);
        let pooled = EvidencePooling.pool(&local, &BetaDistribution::uniform());
        assert_eq!(pooled, local);
    }

    #[test]
    fn test_prior_shifts_mean() {
        let local = BetaDistribution::uniform();
        let prior = BetaDistribution::new(9.0, 1.0);
        assert_eq!(EvidencePooling.pool(&local, &prior).expected(), 0.9);
        assert_eq!(PseudoCountSum.pool(&local, &prior), BetaDistribution::new(10.0, 2.0));
    }

    proptest! {
        #[test]
        fn pooling_is_commutative(
            a in 0.5f64..50.0, b in 0.5f64..50.0, c in 0.5f64..50.0, d in 0.5f64..50.0
        ) {
            let x = BetaDistribution::new(a, b);
            let y = BetaDistribution::new(c, d);
            prop_assert_eq!(EvidencePooling.pool(&x, &y), EvidencePooling.pool(&y, &x));
            prop_assert_eq!(PseudoCountSum.pool(&x, &y), PseudoCountSum.pool(&y, &x));
        }
    }
}
