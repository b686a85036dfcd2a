//! Structured logging bootstrap for EdgeTrust nodes.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the directive the
//! node configuration carries (`info` by default).

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable single-line output
    #[default]
    Plain,
    /// One JSON object per event, for log aggregation
    Json,
}

/// Build the filter used by [`init`].
pub fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize the global subscriber.
///
/// # Example
/// ```no_run
/// use edgetrust_core::logging::{self, LogFormat};
///
/// logging::init(LogFormat::Plain, "info");
/// tracing::info!(component = "keystore", "node started");
/// ```
pub fn init(format: LogFormat, default_directive: &str) {
    let registry = tracing_subscriber::registry().with(filter(default_directive));

    match format {
        LogFormat::Plain => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true))
            .init(),
    }
    tracing::debug!(?format, directive = default_directive, "logging initialized");
}

/// Like [`init`] but tolerates an already-installed subscriber, for tests.
pub fn try_init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(filter("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}
