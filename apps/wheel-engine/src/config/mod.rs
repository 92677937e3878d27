//! Configuration module for the wheel engine.
//!
//! Loads a YAML file, interpolates environment variables, and validates the
//! result before anything connects to the broker.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wheel_engine::config::load_config;
//!
//! let config = load_config(Some("config.yaml"))?;
//! let settings = config.cycle_settings();
//! ```

mod broker;
mod ledger;
mod observability;
mod runtime;
mod strategy;
mod validation;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use broker::{BrokerConfig, RetrySettings};
pub use ledger::LedgerConfig;
pub use observability::{LoggingConfig, ObservabilityConfig};
pub use runtime::RuntimeConfig;
pub use strategy::{BalanceConfig, StrategyConfig, SymbolConfig};

use crate::application::order_manager::OrderManagerConfig;
use crate::application::services::RunnerConfig;
use crate::application::use_cases::CycleSettings;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),

    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Strategy parameters.
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Loop timing and order limits.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Broker connection.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Trade ledger.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Logging.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Re-run validation, e.g. after command-line overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_config(self)
    }

    /// Settings for the cycle orchestrator.
    #[must_use]
    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            symbols: self.strategy.enabled_symbols(),
            allocation_percentage: self.strategy.balance.allocation_percentage,
            max_wheel_layers: self.strategy.balance.max_wheel_layers,
            sizing: self.strategy.contract_sizing(),
            rolling: self.strategy.roll_policy(),
        }
    }

    /// Timing for the order manager.
    #[must_use]
    pub fn order_manager_config(&self) -> OrderManagerConfig {
        OrderManagerConfig {
            update_interval: secs(self.runtime.update_interval_secs),
            max_order_age: secs(self.runtime.max_order_age_secs),
            max_attempts: self.runtime.max_reprice_attempts,
        }
    }

    /// Timing for the strategy runner.
    #[must_use]
    pub const fn runner_config(&self, once: bool) -> RunnerConfig {
        RunnerConfig {
            cycle_interval: Duration::from_secs(self.runtime.cycle_interval_secs),
            update_interval: Duration::from_secs(self.runtime.update_interval_secs),
            market_check_interval: Duration::from_secs(self.runtime.market_check_interval_secs),
            poll_sleep: Duration::from_secs(1),
            once,
        }
    }
}

fn secs(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    config.validate()?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax. Unset variables
/// without a default become empty.
#[allow(clippy::expect_used)] // Regex is compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}
