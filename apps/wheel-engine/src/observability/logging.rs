//! Global `tracing` subscriber setup.
//!
//! `RUST_LOG` wins when set. Otherwise the configured level applies to this
//! crate, with noisy dependencies held at `warn`.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Error type for subscriber setup.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// A filter directive did not parse.
    #[error("invalid log filter '{directives}': {message}")]
    InvalidFilter {
        /// The rejected directives.
        directives: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber was already installed.
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberError(String),
}

/// Filter directives used when `RUST_LOG` is unset.
#[must_use]
pub fn default_directives(level: &str) -> String {
    format!("wheel_engine={level},sqlx=warn,hyper=warn,reqwest=warn")
}

fn build_filter(level: &str) -> Result<EnvFilter, TracingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = default_directives(level);
    EnvFilter::try_new(&directives).map_err(|e| TracingError::InvalidFilter {
        directives,
        message: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// `level_override` (from the command line) replaces the configured level.
///
/// # Errors
///
/// Returns an error if the level does not parse or a subscriber is
/// already installed.
pub fn init_tracing(
    config: &LoggingConfig,
    level_override: Option<&str>,
) -> Result<(), TracingError> {
    let level = level_override.unwrap_or(config.level.as_str());
    let filter = build_filter(level)?;

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .try_init(),
    };
    result.map_err(|e| TracingError::SubscriberError(e.to_string()))?;

    tracing::debug!(level = %level, format = ?config.format, "Logging initialized");
    Ok(())
}
