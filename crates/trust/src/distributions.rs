//! Beta and streaming Gaussian distributions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Belief about the success probability of a boolean outcome.
///
/// Serialised as `[alpha, beta]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct BetaDistribution {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaDistribution {
    pub const fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// Uninformative prior, one pseudo-count each side.
    pub const fn uniform() -> Self {
        Self::new(1.0, 1.0)
    }

    pub fn expected(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn variance(&self) -> f64 {
        let total = self.alpha + self.beta;
        (self.alpha * self.beta) / (total * total * (total + 1.0))
    }

    pub fn add_good(&mut self) {
        self.alpha += 1.0;
    }

    pub fn add_bad(&mut self) {
        self.beta += 1.0;
    }

    pub fn record(&mut self, good: bool) {
        if good {
            self.add_good()
        } else {
            self.add_bad()
        }
    }
}

impl Default for BetaDistribution {
    fn default() -> Self {
        Self::uniform()
    }
}

impl From<[f64; 2]> for BetaDistribution {
    fn from([alpha, beta]: [f64; 2]) -> Self {
        Self { alpha, beta }
    }
}

impl From<BetaDistribution> for [f64; 2] {
    fn from(d: BetaDistribution) -> Self {
        [d.alpha, d.beta]
    }
}

impl fmt::Display for BetaDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Beta(a={},b={})", self.alpha, self.beta)
    }
}

/// Running mean and sample variance of a continuous metric.
///
/// Updated with Welford's method; no samples are retained. Serialised as
/// `[mean, variance, count]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64, u32)", into = "(f64, f64, u32)")]
pub struct GaussianDistribution {
    mean: f64,
    variance: f64,
    count: u32,
}

impl GaussianDistribution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance; zero below two samples.
    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn update(&mut self, sample: f64) {
        self.count = self.count.saturating_add(1);
        let n = f64::from(self.count);
        let delta = sample - self.mean;
        self.mean += delta / n;
        if self.count > 1 {
            self.variance = ((n - 2.0) * self.variance + delta * (sample - self.mean)) / (n - 1.0);
        }
    }
}

impl From<(f64, f64, u32)> for GaussianDistribution {
    fn from((mean, variance, count): (f64, f64, u32)) -> Self {
        Self {
            mean,
            variance,
            count,
        }
    }
}

impl From<GaussianDistribution> for (f64, f64, u32) {
    fn from(d: GaussianDistribution) -> Self {
        (d.mean, d.variance, d.count)
    }
}

impl fmt::Display for GaussianDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N(mean={},var={},n={})", self.mean, self.variance, self.count)
    }
}
