//! Alpaca-specific error types.

use thiserror::Error;

use crate::application::ports::BrokerError;

/// Errors from the Alpaca adapter.
#[derive(Debug, Error, Clone)]
pub enum AlpacaError {
    /// API returned an error.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code from the API.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Broker-side failure (5xx or request timeout).
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Order was rejected.
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Authentication failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },

    /// Network error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Resource not found.
    #[error("Not found: {path}")]
    NotFound {
        /// Request path.
        path: String,
    },
}

impl From<AlpacaError> for BrokerError {
    fn from(err: AlpacaError) -> Self {
        match err {
            AlpacaError::Network(message) => Self::Connection { message },
            AlpacaError::Server { status, message } => Self::Server { status, message },
            AlpacaError::RateLimited { .. } => Self::RateLimited,
            AlpacaError::JsonParse(message) => Self::InvalidResponse { message },
            AlpacaError::OrderRejected(reason) => Self::OrderRejected { reason },
            AlpacaError::AuthenticationFailed => Self::AuthenticationFailed {
                message: "Alpaca rejected the API credentials".to_string(),
            },
            AlpacaError::NotFound { path } => Self::NotFound { resource: path },
            AlpacaError::Api { code, message } => Self::Unknown {
                message: format!("{code}: {message}"),
            },
        }
    }
}
