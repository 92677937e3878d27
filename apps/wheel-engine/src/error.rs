//! Engine-level errors.
//!
//! Each layer has its own `thiserror` enum. Anything that reaches the cycle
//! orchestrator or the runner is folded into an [`EngineError`], which carries
//! a stable [`ErrorCode`] plus key/value context for the logs.
//!
//! | Code | Source | Fatal for the cycle |
//! |------|--------|---------------------|
//! | `DATA_INTEGRITY` | position derivation | yes |
//! | `INVALID_SYMBOL` | OCC parsing | yes |
//! | `LEDGER` | SQLite ledger | yes |
//! | `CONFIG` | configuration | yes |
//! | `BROKER_API` | broker adapter | no |
//! | `BROKER_UNAVAILABLE` | open circuit / transport | no |
//! | `INVALID_ORDER` | order manager | no |
//! | `INTERNAL` | anything else | no |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::order_manager::OrderManagerError;
use crate::application::ports::{BrokerError, LedgerError};
use crate::config::ConfigError;
use crate::domain::wheel::{DataIntegrityError, OptionSymbolError};

/// Error codes for the wheel engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Positions violate the wheel invariants.
    DataIntegrity,
    /// An option symbol could not be decoded.
    InvalidSymbol,
    /// Broker rejected or failed a request.
    BrokerApi,
    /// Broker unreachable or its circuit is open.
    BrokerUnavailable,
    /// Order parameters were invalid.
    InvalidOrder,
    /// Ledger read or write failed.
    Ledger,
    /// Configuration could not be loaded or validated.
    Config,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorCode {
    /// Stable reason string for logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::DataIntegrity => "DATA_INTEGRITY",
            Self::InvalidSymbol => "INVALID_SYMBOL",
            Self::BrokerApi => "BROKER_API",
            Self::BrokerUnavailable => "BROKER_UNAVAILABLE",
            Self::InvalidOrder => "INVALID_ORDER",
            Self::Ledger => "LEDGER",
            Self::Config => "CONFIG",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// A rich error with context for the wheel engine.
#[derive(Debug, Error)]
pub struct EngineError {
    code: ErrorCode,
    message: String,
    context: Vec<(String, String)>,
}

impl EngineError {
    /// Create a new engine error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Whether the current cycle's view of the account can no longer be trusted.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::DataIntegrity | ErrorCode::InvalidSymbol | ErrorCode::Ledger | ErrorCode::Config
        )
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)?;
        for (key, value) in &self.context {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

impl From<DataIntegrityError> for EngineError {
    fn from(err: DataIntegrityError) -> Self {
        let underlying = match &err {
            DataIntegrityError::NonPositiveEquity { symbol, .. }
            | DataIntegrityError::NonNegativeOption { symbol, .. } => Some(symbol.clone()),
            DataIntegrityError::ConflictingPosition { underlying, .. }
            | DataIntegrityError::IncompleteState { underlying, .. } => Some(underlying.clone()),
            DataIntegrityError::Symbol(_) => None,
        };
        let error = Self::new(ErrorCode::DataIntegrity, err.to_string());
        match underlying {
            Some(symbol) => error.with_context("symbol", symbol),
            None => error,
        }
    }
}

impl From<OptionSymbolError> for EngineError {
    fn from(err: OptionSymbolError) -> Self {
        Self::new(ErrorCode::InvalidSymbol, err.to_string())
    }
}

impl From<BrokerError> for EngineError {
    fn from(err: BrokerError) -> Self {
        let code = match err {
            BrokerError::Connection { .. } | BrokerError::CircuitOpen { .. } => ErrorCode::BrokerUnavailable,
            _ => ErrorCode::BrokerApi,
        };
        Self::new(code, err.to_string())
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        Self::new(ErrorCode::Ledger, err.to_string())
    }
}

impl From<OrderManagerError> for EngineError {
    fn from(err: OrderManagerError) -> Self {
        let OrderManagerError::InvalidQuantity { ref symbol, .. } = err;
        let symbol = symbol.clone();
        Self::new(ErrorCode::InvalidOrder, err.to_string()).with_context("symbol", symbol)
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorCode::Config, err.to_string())
    }
}
