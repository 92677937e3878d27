//! Option contract metadata, quotes, and the joined candidate.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::wheel::OptionType;

/// Listed contract metadata (no quote).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionContract {
    /// OCC symbol.
    pub symbol: String,
    /// Underlying root.
    pub underlying: String,
    /// Put or call.
    pub option_type: OptionType,
    /// Strike price.
    pub strike: Decimal,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Open interest, when reported.
    pub open_interest: Option<u64>,
}

/// Latest quote and greeks for one contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionSnapshot {
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// Delta, when the feed provides greeks.
    pub delta: Option<f64>,
}

impl OptionSnapshot {
    /// Ask minus bid.
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// A contract joined with its quote, ready for filtering and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionCandidate {
    /// OCC symbol.
    pub symbol: String,
    /// Underlying root.
    pub underlying: String,
    /// Strike price.
    pub strike: Decimal,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Calendar days to expiration.
    pub dte: i64,
    /// Open interest.
    pub open_interest: Option<u64>,
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// Delta.
    pub delta: Option<f64>,
}

impl OptionCandidate {
    /// Join contract metadata with its snapshot. `today` is the New York trading date.
    #[must_use]
    pub fn from_contract(contract: &OptionContract, snapshot: &OptionSnapshot, today: NaiveDate) -> Self {
        Self {
            symbol: contract.symbol.clone(),
            underlying: contract.underlying.clone(),
            strike: contract.strike,
            expiration: contract.expiration,
            dte: (contract.expiration - today).num_days(),
            open_interest: contract.open_interest,
            bid: snapshot.bid,
            ask: snapshot.ask,
            delta: snapshot.delta,
        }
    }
}

/// Join contracts with snapshots, dropping contracts that have no snapshot.
#[must_use]
pub fn join_snapshots<S: std::hash::BuildHasher>(
    contracts: &[OptionContract],
    snapshots: &std::collections::HashMap<String, OptionSnapshot, S>,
    today: NaiveDate,
) -> Vec<OptionCandidate> {
    contracts
        .iter()
        .filter_map(|contract| {
            snapshots
                .get(&contract.symbol)
                .map(|snapshot| OptionCandidate::from_contract(contract, snapshot, today))
        })
        .collect()
}
