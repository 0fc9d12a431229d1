//! Logging setup.
//!
//! The engine emits `tracing` events and spans; nothing is printed unless the
//! host installs a subscriber. [`init_logging`] installs a `tracing-subscriber`
//! formatter filtered by `RUST_LOG` (default `info`).

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn try_init_logging(format: LogFormat) -> anyhow::Result<()> {
    let builder = fmt().with_env_filter(env_filter()).with_target(true);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install log subscriber: {err}"))
}

/// Installs the global subscriber, ignoring an already-installed one.
pub fn init_logging(format: LogFormat) {
    if let Err(err) = try_init_logging(format) {
        tracing::debug!(error = %err, "Log subscriber already installed");
    }
}
