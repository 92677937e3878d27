//! Alpaca adapter configuration.

use std::time::Duration;

use crate::broker::BrokerRetryPolicy;
use crate::resilience::CircuitBreakerConfig;

/// Environment for Alpaca API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpacaEnvironment {
    /// Paper trading (simulated).
    Paper,
    /// Live trading (real money).
    Live,
}

impl AlpacaEnvironment {
    /// Get the base URL for the trading API.
    #[must_use]
    pub const fn trading_base_url(&self) -> &'static str {
        match self {
            Self::Paper => "https://paper-api.alpaca.markets",
            Self::Live => "https://api.alpaca.markets",
        }
    }

    /// Get the base URL for the market data API.
    #[must_use]
    pub const fn data_base_url(&self) -> &'static str {
        "https://data.alpaca.markets"
    }

    /// Check if this is live trading.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl std::fmt::Display for AlpacaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "PAPER"),
            Self::Live => write!(f, "LIVE"),
        }
    }
}

/// Configuration for the Alpaca broker adapter.
#[derive(Debug, Clone)]
pub struct AlpacaConfig {
    /// API key.
    pub api_key: String,
    /// API secret.
    pub api_secret: String,
    /// Trading environment.
    pub environment: AlpacaEnvironment,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Retry policy applied to every call.
    pub retry: BrokerRetryPolicy,
    /// Breaker settings for account, position and order calls.
    pub trading_breaker: CircuitBreakerConfig,
    /// Breaker settings for equity quotes.
    pub market_data_breaker: CircuitBreakerConfig,
    /// Breaker settings for option contracts and snapshots.
    pub options_breaker: CircuitBreakerConfig,
    trading_url_override: Option<String>,
    data_url_override: Option<String>,
}

impl AlpacaConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(api_key: String, api_secret: String, environment: AlpacaEnvironment) -> Self {
        Self {
            api_key,
            api_secret,
            environment,
            timeout: Duration::from_secs(30),
            retry: BrokerRetryPolicy::default(),
            trading_breaker: CircuitBreakerConfig::trading(),
            market_data_breaker: CircuitBreakerConfig::market_data(),
            options_breaker: CircuitBreakerConfig::options(),
            trading_url_override: None,
            data_url_override: None,
        }
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: BrokerRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Point both APIs at another host (used against local mocks).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.trading_url_override = Some(base_url.clone());
        self.data_url_override = Some(base_url);
        self
    }

    /// Get the trading API base URL.
    #[must_use]
    pub fn trading_base_url(&self) -> &str {
        self.trading_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.trading_base_url())
    }

    /// Get the data API base URL.
    #[must_use]
    pub fn data_base_url(&self) -> &str {
        self.data_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.data_base_url())
    }
}
