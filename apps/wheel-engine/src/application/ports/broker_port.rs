//! Broker Port (Driven Port)
//!
//! Interface for account, position, market data and order calls against the
//! brokerage. Every call either succeeds or returns a [`BrokerError`]; callers
//! treat an error as "did not happen".

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::selection::{OptionContract, OptionSnapshot};
use crate::domain::wheel::{OptionType, Position};

/// Buying power and equity for the trading account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Cash available without margin.
    pub non_marginable_buying_power: Decimal,
    /// Buying power available to options.
    pub options_buying_power: Decimal,
    /// Total portfolio value.
    pub portfolio_value: Decimal,
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy (to open or to close).
    Buy,
    /// Sell (to open or to close).
    Sell,
}

impl OrderSide {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order status as reported by the broker, collapsed to what the engine acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerOrderStatus {
    /// Working at the broker (new, accepted, pending, replaced).
    Open,
    /// Partially filled and still working.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Canceled or rejected.
    Canceled,
    /// Expired at the broker.
    Expired,
}

impl BrokerOrderStatus {
    /// Whether the broker is done with the order.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Expired)
    }
}

/// Acknowledgment returned by order calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Broker order ID. A replace returns the ID of the new order.
    pub order_id: String,
    /// Current status.
    pub status: BrokerOrderStatus,
    /// Average fill price, once filled.
    pub filled_avg_price: Option<Decimal>,
}

/// Inclusive expiration date range for contract queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationWindow {
    /// Earliest expiration.
    pub start: NaiveDate,
    /// Latest expiration.
    pub end: NaiveDate,
}

impl ExpirationWindow {
    /// Window of `min_days..=max_days` from `today`.
    #[must_use]
    pub fn from_today(today: NaiveDate, min_days: u32, max_days: u32) -> Self {
        Self {
            start: today + Duration::days(i64::from(min_days)),
            end: today + Duration::days(i64::from(max_days)),
        }
    }
}

/// Broker port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Transport failure or timeout.
    #[error("Broker connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited by broker")]
    RateLimited,

    /// Broker-side 5xx.
    #[error("Broker server error ({status}): {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Error details.
        message: String,
    },

    /// Credentials rejected.
    #[error("Broker authentication failed: {message}")]
    AuthenticationFailed {
        /// Error details.
        message: String,
    },

    /// Order rejected by broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order or resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        /// What was looked up.
        resource: String,
    },

    /// Circuit breaker refused the call.
    #[error("Circuit breaker '{breaker}' is open")]
    CircuitOpen {
        /// Breaker name.
        breaker: String,
    },

    /// Response could not be interpreted.
    #[error("Invalid broker response: {message}")]
    InvalidResponse {
        /// Error details.
        message: String,
    },

    /// Unknown error.
    #[error("Broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl BrokerError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::RateLimited | Self::Server { .. }
        )
    }
}

/// Port for broker interactions.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// All open positions.
    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Account buying power and equity.
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError>;

    /// Non-marginable buying power. Negative values are rejected.
    async fn get_non_margin_buying_power(&self) -> Result<Decimal, BrokerError> {
        let account = self.get_account().await?;
        non_negative("non_marginable_buying_power", account.non_marginable_buying_power)
    }

    /// Options buying power. Negative values are rejected.
    async fn get_options_buying_power(&self) -> Result<Decimal, BrokerError> {
        let account = self.get_account().await?;
        non_negative("options_buying_power", account.options_buying_power)
    }

    /// Latest quote and greeks per option symbol. Symbols without data are absent.
    async fn get_option_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, OptionSnapshot>, BrokerError>;

    /// Active contracts of `option_type` on `underlyings` expiring inside `window`.
    async fn get_options_contracts(
        &self,
        underlyings: &[String],
        option_type: OptionType,
        window: ExpirationWindow,
    ) -> Result<Vec<OptionContract>, BrokerError>;

    /// Latest trade price per equity symbol.
    async fn get_latest_trades(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Decimal>, BrokerError>;

    /// Submit a DAY limit order.
    async fn submit_limit_order(
        &self,
        symbol: &str,
        qty: i64,
        side: OrderSide,
        limit_price: Decimal,
    ) -> Result<OrderAck, BrokerError>;

    /// Submit a DAY market order.
    async fn submit_market_order(
        &self,
        symbol: &str,
        qty: i64,
        side: OrderSide,
    ) -> Result<OrderAck, BrokerError>;

    /// Replace a working order's quantity and limit price.
    async fn replace_order(
        &self,
        order_id: &str,
        qty: i64,
        limit_price: Decimal,
    ) -> Result<OrderAck, BrokerError>;

    /// Cancel a working order.
    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError>;

    /// Current status of an order.
    async fn get_order(&self, order_id: &str) -> Result<OrderAck, BrokerError>;
}

fn non_negative(field: &str, value: Decimal) -> Result<Decimal, BrokerError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(BrokerError::InvalidResponse {
            message: format!("{field} is negative: {value}"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct AccountOnly(AccountSnapshot);

    #[async_trait]
    impl BrokerPort for AccountOnly {
        async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
            Ok(Vec::new())
        }

        async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
            Ok(self.0)
        }

        async fn get_option_snapshots(
            &self,
            _symbols: &[String],
        ) -> Result<HashMap<String, OptionSnapshot>, BrokerError> {
            Ok(HashMap::new())
        }

        async fn get_options_contracts(
            &self,
            _underlyings: &[String],
            _option_type: OptionType,
            _window: ExpirationWindow,
        ) -> Result<Vec<OptionContract>, BrokerError> {
            Ok(Vec::new())
        }

        async fn get_latest_trades(
            &self,
            _symbols: &[String],
        ) -> Result<HashMap<String, Decimal>, BrokerError> {
            Ok(HashMap::new())
        }

        async fn submit_limit_order(
            &self,
            _symbol: &str,
            _qty: i64,
            _side: OrderSide,
            _limit_price: Decimal,
        ) -> Result<OrderAck, BrokerError> {
            Err(BrokerError::Unknown {
                message: "unsupported".to_string(),
            })
        }

        async fn submit_market_order(
            &self,
            _symbol: &str,
            _qty: i64,
            _side: OrderSide,
        ) -> Result<OrderAck, BrokerError> {
            Err(BrokerError::Unknown {
                message: "unsupported".to_string(),
            })
        }

        async fn replace_order(
            &self,
            order_id: &str,
            _qty: i64,
            _limit_price: Decimal,
        ) -> Result<OrderAck, BrokerError> {
            Err(BrokerError::NotFound {
                resource: order_id.to_string(),
            })
        }

        async fn cancel_order(&self, _order_id: &str) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn get_order(&self, order_id: &str) -> Result<OrderAck, BrokerError> {
            Err(BrokerError::NotFound {
                resource: order_id.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn buying_power_defaults_read_account() {
        let broker = AccountOnly(AccountSnapshot {
            non_marginable_buying_power: dec!(20000),
            options_buying_power: dec!(15000),
            portfolio_value: dec!(40000),
        });
        assert_eq!(broker.get_non_margin_buying_power().await.unwrap(), dec!(20000));
        assert_eq!(broker.get_options_buying_power().await.unwrap(), dec!(15000));
    }

    #[tokio::test]
    async fn negative_buying_power_is_rejected() {
        let broker = AccountOnly(AccountSnapshot {
            non_marginable_buying_power: dec!(-1),
            options_buying_power: dec!(0),
            portfolio_value: dec!(0),
        });
        assert!(matches!(
            broker.get_non_margin_buying_power().await,
            Err(BrokerError::InvalidResponse { .. })
        ));
        assert_eq!(broker.get_options_buying_power().await.unwrap(), dec!(0));
    }

    #[test]
    fn retryable_classification() {
        assert!(BrokerError::RateLimited.is_retryable());
        assert!(
            BrokerError::Server {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !BrokerError::OrderRejected {
                reason: "x".to_string()
            }
            .is_retryable()
        );
        assert!(
            !BrokerError::CircuitOpen {
                breaker: "trading".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn expiration_window_offsets_today() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let window = ExpirationWindow::from_today(today, 0, 21);
        assert_eq!(window.start, today);
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
    }
}
