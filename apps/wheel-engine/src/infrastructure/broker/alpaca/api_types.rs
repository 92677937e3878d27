//! Alpaca API request and response types.
//!
//! These types map directly to Alpaca's REST API format. Prices and
//! quantities on the trading API arrive as strings; the data API sends numbers.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::application::ports::{AccountSnapshot, BrokerOrderStatus, OrderAck};
use crate::domain::selection::{OptionContract, OptionSnapshot};
use crate::domain::wheel::{AssetClass, OptionType, Position};

use super::error::AlpacaError;

/// Error body returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Numeric error code.
    #[serde(default)]
    pub code: Option<u64>,
    /// Error message.
    pub message: String,
}

// ============================================================================
// Orders
// ============================================================================

/// Order request for Alpaca API.
#[derive(Debug, Clone, Serialize)]
pub struct AlpacaOrderRequest {
    /// Equity or OCC option symbol.
    pub symbol: String,
    /// Quantity.
    pub qty: String,
    /// Order side.
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Time in force. Options only accept `day`.
    pub time_in_force: String,
    /// Limit price (for limit orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// Client order ID.
    pub client_order_id: String,
}

/// Replace request (`PATCH /v2/orders/{id}`).
#[derive(Debug, Clone, Serialize)]
pub struct AlpacaReplaceRequest {
    /// New quantity.
    pub qty: String,
    /// New limit price.
    pub limit_price: String,
}

/// Order response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrderResponse {
    /// Broker order ID.
    pub id: String,
    /// Order status.
    pub status: String,
    /// Average fill price.
    #[serde(default)]
    pub filled_avg_price: Option<String>,
}

impl AlpacaOrderResponse {
    /// Convert to `OrderAck`.
    pub fn to_order_ack(&self) -> Result<OrderAck, AlpacaError> {
        let filled_avg_price = self
            .filled_avg_price
            .as_deref()
            .map(|p| parse_decimal("filled_avg_price", p))
            .transpose()?;
        Ok(OrderAck {
            order_id: self.id.clone(),
            status: parse_order_status(&self.status),
            filled_avg_price,
        })
    }
}

/// Map Alpaca's order status onto the states the engine acts on.
#[must_use]
pub fn parse_order_status(status: &str) -> BrokerOrderStatus {
    match status {
        "partially_filled" => BrokerOrderStatus::PartiallyFilled,
        "filled" => BrokerOrderStatus::Filled,
        "expired" => BrokerOrderStatus::Expired,
        "canceled" | "rejected" | "replaced" | "done_for_day" | "stopped" | "suspended" => {
            BrokerOrderStatus::Canceled
        }
        _ => BrokerOrderStatus::Open,
    }
}

// ============================================================================
// Account and positions
// ============================================================================

/// Account response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaAccountResponse {
    /// Cash buying power.
    pub non_marginable_buying_power: String,
    /// Options buying power.
    #[serde(default)]
    pub options_buying_power: Option<String>,
    /// Portfolio value.
    pub portfolio_value: String,
}

impl AlpacaAccountResponse {
    /// Convert to `AccountSnapshot`.
    pub fn to_snapshot(&self) -> Result<AccountSnapshot, AlpacaError> {
        Ok(AccountSnapshot {
            non_marginable_buying_power: parse_decimal(
                "non_marginable_buying_power",
                &self.non_marginable_buying_power,
            )?,
            options_buying_power: self
                .options_buying_power
                .as_deref()
                .map(|v| parse_decimal("options_buying_power", v))
                .transpose()?
                .unwrap_or(Decimal::ZERO),
            portfolio_value: parse_decimal("portfolio_value", &self.portfolio_value)?,
        })
    }
}

/// Position response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaPositionResponse {
    /// Symbol.
    pub symbol: String,
    /// `us_equity`, `us_option`, `crypto`.
    pub asset_class: String,
    /// Signed quantity.
    pub qty: String,
    /// Average entry price.
    pub avg_entry_price: String,
    /// Last price.
    #[serde(default)]
    pub current_price: Option<String>,
    /// Market value.
    #[serde(default)]
    pub market_value: Option<String>,
}

impl AlpacaPositionResponse {
    /// Convert to the domain `Position`.
    pub fn to_position(&self) -> Result<Position, AlpacaError> {
        let qty = parse_decimal("qty", &self.qty)?;
        let qty = qty
            .trunc()
            .to_i64()
            .ok_or_else(|| AlpacaError::JsonParse(format!("qty out of range: {qty}")))?;
        let optional = |field: &str, value: Option<&str>| {
            value
                .map(|v| parse_decimal(field, v))
                .transpose()
                .map(Option::unwrap_or_default)
        };
        Ok(Position {
            symbol: self.symbol.clone(),
            asset_class: if self.asset_class == "us_option" {
                AssetClass::Option
            } else {
                AssetClass::Equity
            },
            qty,
            avg_entry_price: parse_decimal("avg_entry_price", &self.avg_entry_price)?,
            current_price: optional("current_price", self.current_price.as_deref())?,
            market_value: optional("market_value", self.market_value.as_deref())?,
        })
    }
}

// ============================================================================
// Option contracts
// ============================================================================

/// One page of `GET /v2/options/contracts`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaContractsPage {
    /// Contracts on this page.
    #[serde(default)]
    pub option_contracts: Vec<AlpacaContract>,
    /// Token for the next page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Listed option contract.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaContract {
    /// OCC symbol.
    pub symbol: String,
    /// Underlying root.
    pub underlying_symbol: String,
    /// `put` or `call`.
    #[serde(rename = "type")]
    pub contract_type: String,
    /// Strike price.
    pub strike_price: String,
    /// Expiration date.
    pub expiration_date: NaiveDate,
    /// Open interest.
    #[serde(default)]
    pub open_interest: Option<String>,
}

impl AlpacaContract {
    /// Convert to the domain `OptionContract`.
    pub fn to_contract(&self) -> Result<OptionContract, AlpacaError> {
        let option_type = match self.contract_type.as_str() {
            "put" => OptionType::Put,
            "call" => OptionType::Call,
            other => {
                return Err(AlpacaError::JsonParse(format!(
                    "unknown contract type '{other}' for {}",
                    self.symbol
                )));
            }
        };
        Ok(OptionContract {
            symbol: self.symbol.clone(),
            underlying: self.underlying_symbol.clone(),
            option_type,
            strike: parse_decimal("strike_price", &self.strike_price)?,
            expiration: self.expiration_date,
            open_interest: self.open_interest.as_deref().and_then(|v| v.parse().ok()),
        })
    }
}

// ============================================================================
// Market data
// ============================================================================

/// `GET /v1beta1/options/snapshots` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaSnapshotsResponse {
    /// Snapshot per OCC symbol.
    #[serde(default)]
    pub snapshots: HashMap<String, AlpacaOptionSnapshot>,
}

/// One option snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlpacaOptionSnapshot {
    /// Latest NBBO quote.
    #[serde(default)]
    pub latest_quote: Option<AlpacaQuote>,
    /// Greeks, when computed.
    #[serde(default)]
    pub greeks: Option<AlpacaGreeks>,
}

impl AlpacaOptionSnapshot {
    /// Convert to `OptionSnapshot`. Snapshots without a quote are dropped.
    #[must_use]
    pub fn to_snapshot(&self) -> Option<OptionSnapshot> {
        let quote = self.latest_quote.as_ref()?;
        Some(OptionSnapshot {
            bid: quote.bp,
            ask: quote.ap,
            delta: self.greeks.as_ref().and_then(|g| g.delta),
        })
    }
}

/// Quote fields.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaQuote {
    /// Bid price.
    pub bp: Decimal,
    /// Ask price.
    pub ap: Decimal,
}

/// Greeks fields.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaGreeks {
    /// Delta.
    #[serde(default)]
    pub delta: Option<f64>,
}

/// `GET /v2/stocks/trades/latest` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaLatestTradesResponse {
    /// Latest trade per symbol.
    #[serde(default)]
    pub trades: HashMap<String, AlpacaTrade>,
}

/// Trade fields.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaTrade {
    /// Trade price.
    pub p: Decimal,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, AlpacaError> {
    value
        .parse()
        .map_err(|_| AlpacaError::JsonParse(format!("invalid {field}: '{value}'")))
}
