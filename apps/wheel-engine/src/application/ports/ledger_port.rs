//! Ledger Port (Driven Port)
//!
//! Interface for recording positions, premiums and trades, and for reading
//! the premium-adjusted cost basis back.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::wheel::{CONTRACT_MULTIPLIER, OptionType};

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// Stored text value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Parse a stored text value.
            #[must_use]
            pub fn parse(raw: &str) -> Option<Self> {
                match raw {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum! {
    /// Kind of ledger position.
    PositionType {
        /// Shares.
        Stock => "stock",
        /// Short put.
        Put => "put",
        /// Short call.
        Call => "call",
    }
}

text_enum! {
    /// Lifecycle of a ledger position.
    PositionStatus {
        /// Still held.
        Open => "open",
        /// Closed by trade.
        Closed => "closed",
        /// Closed by assignment.
        Assigned => "assigned",
        /// Closed by expiry.
        Expired => "expired",
    }
}

text_enum! {
    /// Lifecycle of a premium record.
    PremiumStatus {
        /// Order working, nothing received yet.
        Pending => "pending",
        /// Premium received.
        Collected => "collected",
        /// Option was assigned.
        Assigned => "assigned",
        /// Option expired worthless.
        Expired => "expired",
        /// Order never filled.
        Cancelled => "cancelled",
    }
}

impl PremiumStatus {
    /// Whether the premium was actually received.
    #[must_use]
    pub const fn is_realized(self) -> bool {
        matches!(self, Self::Collected | Self::Assigned | Self::Expired)
    }

    /// Whether the premium lowers the share cost basis.
    #[must_use]
    pub const fn reduces_cost_basis(self) -> bool {
        matches!(self, Self::Collected | Self::Expired)
    }
}

text_enum! {
    /// Kind of trade history entry.
    TradeType {
        /// Sell to open a put.
        SellPut => "sell_put",
        /// Sell to open a call.
        SellCall => "sell_call",
        /// Buy shares.
        BuyStock => "buy_stock",
        /// Sell shares.
        SellStock => "sell_stock",
        /// Buy to close an option.
        BuyToClose => "buy_to_close",
    }
}

/// OCC type letter stored in the premiums table.
#[must_use]
pub const fn option_type_code(option_type: OptionType) -> &'static str {
    match option_type {
        OptionType::Put => "P",
        OptionType::Call => "C",
    }
}

/// Ledger error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    /// Database stayed locked after every retry.
    #[error("Ledger locked: {message}")]
    Locked {
        /// Driver message.
        message: String,
    },

    /// Could not open or reach the database.
    #[error("Ledger connection error: {0}")]
    Connection(String),

    /// Statement failed.
    #[error("Ledger query error: {0}")]
    Query(String),

    /// Stored row could not be decoded.
    #[error("Ledger data error: {0}")]
    Data(String),

    /// Row does not exist.
    #[error("Ledger record not found: {0}")]
    NotFound(i64),
}

impl LedgerError {
    /// Whether this is transient lock contention.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

/// Premium to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPremium {
    /// Underlying symbol.
    pub symbol: String,
    /// Put or call.
    pub option_type: OptionType,
    /// Strike.
    pub strike: Decimal,
    /// Premium per share.
    pub premium: Decimal,
    /// Contracts.
    pub contracts: i64,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Status.
    pub status: PremiumStatus,
    /// Free-form note.
    pub notes: Option<String>,
}

/// Trade to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrade {
    /// Underlying symbol.
    pub symbol: String,
    /// Trade kind.
    pub trade_type: TradeType,
    /// Quantity.
    pub quantity: i64,
    /// Execution price (zero when unknown).
    pub price: Decimal,
    /// Option strike.
    pub strike: Option<Decimal>,
    /// Option expiration.
    pub expiration: Option<NaiveDate>,
    /// Premium per share.
    pub premium: Option<Decimal>,
    /// Free-form note.
    pub notes: Option<String>,
}

/// Stored position row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Row ID.
    pub id: i64,
    /// Symbol.
    pub symbol: String,
    /// Kind.
    pub position_type: PositionType,
    /// Quantity.
    pub quantity: i64,
    /// Entry price.
    pub entry_price: Decimal,
    /// Entry time.
    pub entry_date: DateTime<Utc>,
    /// Exit price, once closed.
    pub exit_price: Option<Decimal>,
    /// Exit time, once closed.
    pub exit_date: Option<DateTime<Utc>>,
    /// Status.
    pub status: PositionStatus,
}

/// Stored premium row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumRecord {
    /// Row ID.
    pub id: i64,
    /// Underlying symbol.
    pub symbol: String,
    /// Put or call.
    pub option_type: OptionType,
    /// Strike.
    pub strike: Decimal,
    /// Premium per share.
    pub premium: Decimal,
    /// Contracts.
    pub contracts: i64,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Trade time.
    pub trade_date: DateTime<Utc>,
    /// Status.
    pub status: PremiumStatus,
    /// Linked position row.
    pub position_id: Option<i64>,
    /// Free-form note.
    pub notes: Option<String>,
}

/// Premium-adjusted cost basis for held shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBasis {
    /// Average cost less call premium per share, floored at zero.
    pub adjusted_cost: Decimal,
    /// Share-weighted average entry price.
    pub original_cost: Decimal,
    /// Σ call premium × contracts.
    pub total_premiums: Decimal,
    /// Shares held.
    pub shares: i64,
}

impl CostBasis {
    /// Compute from open stock lots `(qty, entry_price)` and counted call
    /// premiums `(premium, contracts)`. `None` when no shares are held.
    #[must_use]
    pub fn compute(stock_lots: &[(i64, Decimal)], call_premiums: &[(Decimal, i64)]) -> Option<Self> {
        let shares: i64 = stock_lots.iter().map(|(qty, _)| qty).sum();
        if shares <= 0 {
            return None;
        }

        let total_cost: Decimal = stock_lots
            .iter()
            .map(|(qty, price)| Decimal::from(*qty) * price)
            .sum();
        let total_premiums: Decimal = call_premiums
            .iter()
            .map(|(premium, contracts)| premium * Decimal::from(*contracts))
            .sum();

        let shares_dec = Decimal::from(shares);
        let original_cost = total_cost / shares_dec;
        let per_share = total_premiums * Decimal::from(CONTRACT_MULTIPLIER) / shares_dec;

        Some(Self {
            adjusted_cost: (original_cost - per_share).max(Decimal::ZERO),
            original_cost,
            total_premiums,
            shares,
        })
    }
}

/// Premium totals over realized premiums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Distinct underlyings with premiums.
    pub symbols_traded: i64,
    /// Σ put premium × contracts.
    pub total_put_premiums: Decimal,
    /// Σ call premium × contracts.
    pub total_call_premiums: Decimal,
    /// Put premium rows.
    pub put_trades: i64,
    /// Call premium rows.
    pub call_trades: i64,
}

/// Port for the strategy ledger.
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// Open a position row. Returns its ID.
    async fn add_position(
        &self,
        symbol: &str,
        position_type: PositionType,
        quantity: i64,
        entry_price: Decimal,
    ) -> Result<i64, LedgerError>;

    /// Close a position row.
    async fn close_position(
        &self,
        id: i64,
        exit_price: Decimal,
        status: PositionStatus,
    ) -> Result<(), LedgerError>;

    /// Record a premium and refresh the symbol's cost basis. Returns its ID.
    async fn add_premium(&self, premium: NewPremium) -> Result<i64, LedgerError>;

    /// Settle a premium row once its order resolves. `premium` replaces the
    /// recorded amount when given. Refreshes the symbol's cost basis.
    async fn settle_premium(
        &self,
        id: i64,
        status: PremiumStatus,
        premium: Option<Decimal>,
    ) -> Result<(), LedgerError>;

    /// Record a trade. Returns its ID.
    async fn add_trade(&self, trade: NewTrade) -> Result<i64, LedgerError>;

    /// Cost basis for `symbol`, if shares are held.
    async fn get_adjusted_cost_basis(&self, symbol: &str) -> Result<Option<CostBasis>, LedgerError>;

    /// Positions, newest first.
    async fn get_position_history(
        &self,
        symbol: Option<&str>,
        position_type: Option<PositionType>,
        status: Option<PositionStatus>,
    ) -> Result<Vec<PositionRecord>, LedgerError>;

    /// Premiums, newest first.
    async fn get_premium_history(
        &self,
        symbol: Option<&str>,
        option_type: Option<OptionType>,
        days_back: Option<u32>,
    ) -> Result<Vec<PremiumRecord>, LedgerError>;

    /// Premium totals, optionally for one symbol.
    async fn get_summary_stats(&self, symbol: Option<&str>) -> Result<SummaryStats, LedgerError>;
}
