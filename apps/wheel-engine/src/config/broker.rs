//! Broker connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::broker::BrokerRetryPolicy;
use crate::infrastructure::broker::alpaca::{AlpacaConfig, AlpacaEnvironment};

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Trading environment: `PAPER` or `LIVE`.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// API key ID.
    #[serde(default)]
    pub api_key: String,
    /// API secret key.
    #[serde(default)]
    pub api_secret: String,
    /// Overrides both the trading and data hosts.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            api_key: String::new(),
            api_secret: String::new(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

impl BrokerConfig {
    /// Parsed trading environment.
    pub fn environment(&self) -> Result<AlpacaEnvironment, ConfigError> {
        match self.environment.to_ascii_uppercase().as_str() {
            "PAPER" => Ok(AlpacaEnvironment::Paper),
            "LIVE" => Ok(AlpacaEnvironment::Live),
            other => Err(ConfigError::ValidationError(format!(
                "broker.environment must be PAPER or LIVE, got '{other}'"
            ))),
        }
    }

    /// Adapter configuration. Credentials must be present.
    pub fn to_alpaca_config(&self) -> Result<AlpacaConfig, ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingEnvVar("ALPACA_KEY".to_string()));
        }
        if self.api_secret.is_empty() {
            return Err(ConfigError::MissingEnvVar("ALPACA_SECRET".to_string()));
        }

        let mut config = AlpacaConfig::new(
            self.api_key.clone(),
            self.api_secret.clone(),
            self.environment()?,
        )
        .with_timeout(Duration::from_secs(self.timeout_secs))
        .with_retry(self.retry.to_policy());
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(config)
    }
}

/// Retry settings in config units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Growth per attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Delays are scaled by a random factor in `[1 - jitter, 1]`.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetrySettings {
    /// Convert to the broker retry policy.
    #[must_use]
    pub const fn to_policy(&self) -> BrokerRetryPolicy {
        BrokerRetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
            self.backoff_multiplier,
            self.jitter_factor,
        )
    }
}

fn default_environment() -> String {
    "PAPER".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_jitter_factor() -> f64 {
    0.5
}
