//! Trust metric kinds and per-application weight tables.

use edgetrust_core::ApplicationWeights;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// How far a weight table may stray from summing to 1 before a warning.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-4;

/// A quantity the trust value can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustMetric {
    TaskSubmission,
    TaskResult,
    ResultQuality,
    Throughput,
    ChallengeResponse,
}

impl TrustMetric {
    pub const ALL: [TrustMetric; 5] = [
        TrustMetric::TaskSubmission,
        TrustMetric::TaskResult,
        TrustMetric::ResultQuality,
        TrustMetric::Throughput,
        TrustMetric::ChallengeResponse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TrustMetric::TaskSubmission => "task_submission",
            TrustMetric::TaskResult => "task_result",
            TrustMetric::ResultQuality => "result_quality",
            TrustMetric::Throughput => "throughput",
            TrustMetric::ChallengeResponse => "challenge_response",
        }
    }
}

impl fmt::Display for TrustMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrustMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrustMetric::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown trust metric {}", s))
    }
}

/// Weight of each metric per application (capability name).
///
/// Metrics an application does not list weigh zero.
#[derive(Debug, Clone, Default)]
pub struct TrustWeights {
    tables: HashMap<String, HashMap<TrustMetric, f64>>,
}

impl TrustWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration. Unknown metric names are dropped with a warning.
    pub fn from_config(applications: &[ApplicationWeights]) -> Self {
        let mut weights = Self::new();
        for app in applications {
            for (name, weight) in &app.weights {
                match name.parse::<TrustMetric>() {
                    Ok(metric) => weights.set(&app.application, metric, *weight),
                    Err(e) => warn!(application = %app.application, error = %e, "ignoring weight"),
                }
            }
        }
        weights
    }

    pub fn set(&mut self, application: &str, metric: TrustMetric, weight: f64) {
        self.tables
            .entry(application.to_string())
            .or_default()
            .insert(metric, weight);
    }

    pub fn weight(&self, application: &str, metric: TrustMetric) -> f64 {
        self.tables
            .get(application)
            .and_then(|t| t.get(&metric))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn applications(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

/// Whether `total` is close enough to 1 to be a well-formed weight table.
pub fn weights_sum_to_one(total: f64) -> bool {
    (total - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
}
