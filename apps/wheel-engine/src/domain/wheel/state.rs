//! Wheel state derivation.
//!
//! Classifies a raw broker snapshot into one [`WheelState`] per underlying.
//! Everything here is a pure function of its input: callers re-derive from a
//! fresh snapshot every cycle instead of carrying state forward.
//!
//! # Transitions
//!
//! ```text
//! (none)  + short put   → ShortPut
//! (none)  + short call  → ShortCallAwaitingStock
//! (none)  + long shares → LongShares
//! ShortPut               + short put   → ShortPut      (layered puts)
//! LongShares             + short call  → ShortCall
//! ShortCallAwaitingStock + long shares → ShortCall
//! anything else                        → DataIntegrityError
//! ```

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::{DataIntegrityError, OptionSymbolError};
use super::occ::OptionType;
use super::position::{AssetClass, Position};

/// Shares per option contract.
pub const CONTRACT_MULTIPLIER: i64 = 100;

const SHARES_PER_LOT: u32 = 100;

/// Open exposure counts for one underlying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionCounts {
    /// Short put contracts.
    pub puts: u32,
    /// Short call contracts.
    pub calls: u32,
    /// Whole 100-share lots.
    pub share_lots: u32,
}

impl PositionCounts {
    /// Wheel layers in use: the larger of put contracts and share lots.
    #[must_use]
    pub fn layers(&self) -> u32 {
        self.puts.max(self.share_lots)
    }
}

/// Discriminant of [`WheelState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelStateKind {
    /// Holding shares, no call sold against them.
    LongShares,
    /// One or more short puts.
    ShortPut,
    /// Shares with a covered call.
    ShortCall,
    /// Short call observed before its shares; never a valid final state.
    ShortCallAwaitingStock,
}

impl WheelStateKind {
    /// Whether derivation may end in this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::ShortCallAwaitingStock)
    }
}

impl fmt::Display for WheelStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LongShares => "long_shares",
            Self::ShortPut => "short_put",
            Self::ShortCall => "short_call",
            Self::ShortCallAwaitingStock => "short_call_awaiting_stock",
        };
        f.write_str(s)
    }
}

/// Where an underlying sits in the wheel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WheelState {
    /// Holding shares.
    LongShares {
        /// Broker average entry price.
        entry_price: Decimal,
        /// Entry price net of call premiums collected.
        adjusted_entry_price: Decimal,
        /// Shares held.
        share_qty: i64,
        /// Counts snapshot.
        counts: PositionCounts,
    },
    /// Cash-secured puts outstanding.
    ShortPut {
        /// Counts snapshot.
        counts: PositionCounts,
    },
    /// Covered call against held shares.
    ShortCall {
        /// Broker average entry price of the shares.
        entry_price: Decimal,
        /// Entry price net of call premiums collected.
        adjusted_entry_price: Decimal,
        /// Shares held.
        share_qty: i64,
        /// Counts snapshot.
        counts: PositionCounts,
    },
    /// Short call seen, shares not yet seen.
    ShortCallAwaitingStock {
        /// Counts snapshot.
        counts: PositionCounts,
    },
}

impl WheelState {
    fn long_shares(entry_price: Decimal, share_qty: i64) -> Self {
        Self::LongShares {
            entry_price,
            adjusted_entry_price: entry_price,
            share_qty,
            counts: PositionCounts::default(),
        }
    }

    /// Discriminant.
    #[must_use]
    pub const fn kind(&self) -> WheelStateKind {
        match self {
            Self::LongShares { .. } => WheelStateKind::LongShares,
            Self::ShortPut { .. } => WheelStateKind::ShortPut,
            Self::ShortCall { .. } => WheelStateKind::ShortCall,
            Self::ShortCallAwaitingStock { .. } => WheelStateKind::ShortCallAwaitingStock,
        }
    }

    /// Counts snapshot attached at derivation.
    #[must_use]
    pub const fn counts(&self) -> PositionCounts {
        match self {
            Self::LongShares { counts, .. }
            | Self::ShortPut { counts }
            | Self::ShortCall { counts, .. }
            | Self::ShortCallAwaitingStock { counts } => *counts,
        }
    }

    /// Share entry price, if shares are held.
    #[must_use]
    pub const fn entry_price(&self) -> Option<Decimal> {
        match self {
            Self::LongShares { entry_price, .. } | Self::ShortCall { entry_price, .. } => {
                Some(*entry_price)
            }
            _ => None,
        }
    }

    /// Premium-adjusted share entry price, if shares are held.
    #[must_use]
    pub const fn adjusted_entry_price(&self) -> Option<Decimal> {
        match self {
            Self::LongShares {
                adjusted_entry_price,
                ..
            }
            | Self::ShortCall {
                adjusted_entry_price,
                ..
            } => Some(*adjusted_entry_price),
            _ => None,
        }
    }

    /// Shares held (zero for option-only states).
    #[must_use]
    pub const fn share_qty(&self) -> i64 {
        match self {
            Self::LongShares { share_qty, .. } | Self::ShortCall { share_qty, .. } => *share_qty,
            _ => 0,
        }
    }

    /// Replace the premium-adjusted entry price. No-op without shares.
    #[must_use]
    pub const fn with_adjusted_entry_price(mut self, adjusted: Decimal) -> Self {
        match &mut self {
            Self::LongShares {
                adjusted_entry_price,
                ..
            }
            | Self::ShortCall {
                adjusted_entry_price,
                ..
            } => *adjusted_entry_price = adjusted,
            _ => {}
        }
        self
    }

    const fn set_counts(&mut self, value: PositionCounts) {
        match self {
            Self::LongShares { counts, .. }
            | Self::ShortPut { counts }
            | Self::ShortCall { counts, .. }
            | Self::ShortCallAwaitingStock { counts } => *counts = value,
        }
    }
}

/// Derive one wheel state per underlying.
pub fn derive_state(
    positions: &[Position],
) -> Result<BTreeMap<String, WheelState>, DataIntegrityError> {
    let mut states: BTreeMap<String, WheelState> = BTreeMap::new();

    for position in positions {
        match position.asset_class {
            AssetClass::Equity => absorb_equity(&mut states, position)?,
            AssetClass::Option => absorb_option(&mut states, position)?,
        }
    }

    let counts = count_positions(positions)?;

    for (underlying, state) in &mut states {
        if !state.kind().is_terminal() {
            return Err(DataIntegrityError::IncompleteState {
                underlying: underlying.clone(),
                state: state.kind(),
            });
        }
        state.set_counts(counts.get(underlying).copied().unwrap_or_default());
    }

    Ok(states)
}

fn absorb_equity(
    states: &mut BTreeMap<String, WheelState>,
    position: &Position,
) -> Result<(), DataIntegrityError> {
    if position.qty <= 0 {
        return Err(DataIntegrityError::NonPositiveEquity {
            symbol: position.symbol.clone(),
            qty: position.qty,
        });
    }

    match states.get(&position.symbol) {
        None => {
            states.insert(
                position.symbol.clone(),
                WheelState::long_shares(position.avg_entry_price, position.qty),
            );
        }
        Some(WheelState::ShortCallAwaitingStock { counts }) => {
            let counts = *counts;
            states.insert(
                position.symbol.clone(),
                WheelState::ShortCall {
                    entry_price: position.avg_entry_price,
                    adjusted_entry_price: position.avg_entry_price,
                    share_qty: position.qty,
                    counts,
                },
            );
        }
        Some(existing) => {
            return Err(DataIntegrityError::ConflictingPosition {
                underlying: position.symbol.clone(),
                existing: existing.kind(),
                incoming: format!("{} long shares", position.qty),
            });
        }
    }
    Ok(())
}

fn absorb_option(
    states: &mut BTreeMap<String, WheelState>,
    position: &Position,
) -> Result<(), DataIntegrityError> {
    if position.qty >= 0 {
        return Err(DataIntegrityError::NonNegativeOption {
            symbol: position.symbol.clone(),
            qty: position.qty,
        });
    }

    let option = position.option_symbol()?;
    let underlying = option.underlying;

    let next = match (states.get(&underlying), option.option_type) {
        (None, OptionType::Put) => WheelState::ShortPut {
            counts: PositionCounts::default(),
        },
        (None, OptionType::Call) => WheelState::ShortCallAwaitingStock {
            counts: PositionCounts::default(),
        },
        (Some(WheelState::ShortPut { .. }), OptionType::Put) => return Ok(()),
        (
            Some(WheelState::LongShares {
                entry_price,
                adjusted_entry_price,
                share_qty,
                counts,
            }),
            OptionType::Call,
        ) => WheelState::ShortCall {
            entry_price: *entry_price,
            adjusted_entry_price: *adjusted_entry_price,
            share_qty: *share_qty,
            counts: *counts,
        },
        (Some(existing), option_type) => {
            return Err(DataIntegrityError::ConflictingPosition {
                underlying,
                existing: existing.kind(),
                incoming: format!("short {option_type} {}", position.symbol),
            });
        }
    };

    states.insert(underlying, next);
    Ok(())
}

/// Count puts, calls and share lots per underlying.
pub fn count_positions(
    positions: &[Position],
) -> Result<BTreeMap<String, PositionCounts>, OptionSymbolError> {
    let mut counts: BTreeMap<String, PositionCounts> = BTreeMap::new();

    for position in positions {
        let qty = u32::try_from(position.abs_qty()).unwrap_or(u32::MAX);
        match position.asset_class {
            AssetClass::Equity => {
                let entry = counts.entry(position.symbol.clone()).or_default();
                entry.share_lots = entry.share_lots.saturating_add(qty / SHARES_PER_LOT);
            }
            AssetClass::Option => {
                let option = position.option_symbol()?;
                let entry = counts.entry(option.underlying).or_default();
                match option.option_type {
                    OptionType::Put => entry.puts = entry.puts.saturating_add(qty),
                    OptionType::Call => entry.calls = entry.calls.saturating_add(qty),
                }
            }
        }
    }

    Ok(counts)
}

/// Capital at risk: deployed share cost plus full assignment value of short puts.
///
/// Calls add nothing; they are covered by shares already counted.
pub fn calculate_risk(positions: &[Position]) -> Result<Decimal, OptionSymbolError> {
    let mut risk = Decimal::ZERO;

    for position in positions {
        match position.asset_class {
            AssetClass::Equity => {
                risk += position.avg_entry_price * Decimal::from(position.abs_qty());
            }
            AssetClass::Option => {
                let option = position.option_symbol()?;
                if option.option_type == OptionType::Put {
                    risk += Decimal::from(CONTRACT_MULTIPLIER)
                        * option.strike
                        * Decimal::from(position.abs_qty());
                }
            }
        }
    }

    Ok(risk)
}
