//! Tracked limit orders.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::OrderSide;

/// Default reprice attempts before an order is left to age out.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// What a tracked order trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Short put.
    Put,
    /// Covered call.
    Call,
    /// Shares.
    Stock,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Put => "put",
            Self::Call => "call",
            Self::Stock => "stock",
        })
    }
}

/// Contract details attached to option orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderContext {
    /// Underlying, when different from the traded symbol.
    pub underlying: Option<String>,
    /// Strike.
    pub strike: Option<Decimal>,
    /// Expiration.
    pub expiration: Option<NaiveDate>,
}

/// A working limit order owned by the order manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Broker order ID.
    pub order_id: String,
    /// Traded symbol.
    pub symbol: String,
    /// Side.
    pub side: OrderSide,
    /// Quantity.
    pub quantity: i64,
    /// Current limit.
    pub limit_price: Decimal,
    /// Bid for sells, ask for buys, at submission.
    pub target_price: Decimal,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last submission or reprice.
    pub last_updated: DateTime<Utc>,
    /// What is traded.
    pub kind: OrderKind,
    /// Underlying.
    pub underlying: String,
    /// Strike, for options.
    pub strike: Option<Decimal>,
    /// Expiration, for options.
    pub expiration: Option<NaiveDate>,
    /// Reprices so far.
    pub attempts: u32,
    /// Reprice ceiling.
    pub max_attempts: u32,
    /// Ledger premium row awaiting this order's outcome.
    #[serde(default)]
    pub premium_id: Option<i64>,
}

impl PendingOrder {
    /// Whether a reprice is due at `now`.
    #[must_use]
    pub fn should_update_at(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        now - self.last_updated >= interval
    }

    /// Whether a reprice is due.
    #[must_use]
    pub fn should_update(&self, interval: Duration) -> bool {
        self.should_update_at(Utc::now(), interval)
    }

    /// Whether the order has outlived `max_age` at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.created_at >= max_age
    }

    /// Whether the order has outlived `max_age`.
    #[must_use]
    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.is_expired_at(Utc::now(), max_age)
    }

    /// Whether reprice attempts are used up.
    #[must_use]
    pub const fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
