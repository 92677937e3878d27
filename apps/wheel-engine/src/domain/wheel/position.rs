//! Broker position view consumed by the state deriver.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::OptionSymbolError;
use super::occ::OptionSymbol;

/// Asset class of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    /// US equity.
    #[serde(rename = "us_equity")]
    Equity,
    /// US listed option.
    #[serde(rename = "us_option")]
    Option,
}

/// A read-only snapshot of one broker position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Equity ticker or OCC option symbol.
    pub symbol: String,
    /// Asset class.
    pub asset_class: AssetClass,
    /// Signed quantity (negative = short).
    pub qty: i64,
    /// Average entry price per share or per contract.
    pub avg_entry_price: Decimal,
    /// Last price.
    pub current_price: Decimal,
    /// Market value.
    pub market_value: Decimal,
}

impl Position {
    /// Equity position with zeroed market fields.
    #[must_use]
    pub fn equity(symbol: impl Into<String>, qty: i64, avg_entry_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class: AssetClass::Equity,
            qty,
            avg_entry_price,
            current_price: Decimal::ZERO,
            market_value: Decimal::ZERO,
        }
    }

    /// Option position with zeroed market fields.
    #[must_use]
    pub fn option(symbol: impl Into<String>, qty: i64, avg_entry_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class: AssetClass::Option,
            qty,
            avg_entry_price,
            current_price: Decimal::ZERO,
            market_value: Decimal::ZERO,
        }
    }

    /// Whether this is an option position.
    #[must_use]
    pub fn is_option(&self) -> bool {
        self.asset_class == AssetClass::Option
    }

    /// Decode the option symbol. Errors for equities.
    pub fn option_symbol(&self) -> Result<OptionSymbol, OptionSymbolError> {
        OptionSymbol::parse(&self.symbol)
    }

    /// Absolute quantity.
    #[must_use]
    pub const fn abs_qty(&self) -> i64 {
        self.qty.abs()
    }
}
