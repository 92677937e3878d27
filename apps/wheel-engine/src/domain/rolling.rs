//! Roll identification.
//!
//! Decides which short puts are close enough to expiry to roll and which
//! replacement contracts a roll strategy admits. Execution lives in the
//! application layer.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::selection::OptionCandidate;
use super::wheel::{OptionSymbolError, OptionType, Position};

/// Which replacement contracts a roll may move into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollStrategy {
    /// Same or higher strike, later expiry.
    #[default]
    Forward,
    /// Lower strike, later expiry.
    Down,
    /// Any strike, later expiry.
    Both,
}

/// Global rolling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingSettings {
    /// Master switch.
    #[serde(default)]
    pub enabled: bool,
    /// Roll when days to expiry is at or below this.
    #[serde(default = "default_days_before_expiry")]
    pub days_before_expiry: i64,
    /// Replacement bid must be at least this.
    #[serde(default = "default_min_premium_to_roll")]
    pub min_premium_to_roll: Decimal,
    /// Target delta for replacements (informational).
    #[serde(default = "default_roll_delta_target")]
    pub roll_delta_target: f64,
}

impl Default for RollingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            days_before_expiry: default_days_before_expiry(),
            min_premium_to_roll: default_min_premium_to_roll(),
            roll_delta_target: default_roll_delta_target(),
        }
    }
}

const fn default_days_before_expiry() -> i64 {
    1
}

const fn default_min_premium_to_roll() -> Decimal {
    Decimal::from_parts(5, 0, 0, false, 2)
}

const fn default_roll_delta_target() -> f64 {
    0.25
}

/// Per-symbol rolling override. Unset fields fall back to the global settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymbolRollOverride {
    /// Enable or disable rolling for this symbol.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Roll strategy for this symbol.
    #[serde(default)]
    pub strategy: Option<RollStrategy>,
}

/// Global settings plus per-symbol overrides.
#[derive(Debug, Clone, Default)]
pub struct RollPolicy {
    /// Global settings.
    pub settings: RollingSettings,
    /// Overrides keyed by underlying.
    pub overrides: HashMap<String, SymbolRollOverride>,
}

impl RollPolicy {
    /// Whether rolling applies to `underlying`.
    #[must_use]
    pub fn is_enabled_for(&self, underlying: &str) -> bool {
        self.overrides
            .get(underlying)
            .and_then(|o| o.enabled)
            .unwrap_or(self.settings.enabled)
    }

    /// Strategy for `underlying`, defaulting to forward.
    #[must_use]
    pub fn strategy_for(&self, underlying: &str) -> RollStrategy {
        self.overrides
            .get(underlying)
            .and_then(|o| o.strategy)
            .unwrap_or_default()
    }
}

/// A short put due to be rolled this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollCandidate {
    /// OCC symbol of the open position.
    pub symbol: String,
    /// Underlying root.
    pub underlying: String,
    /// Current strike.
    pub strike: Decimal,
    /// Current expiration.
    pub expiration: NaiveDate,
    /// Days until expiration.
    pub days_to_expiry: i64,
    /// Contracts held (positive).
    pub quantity: i64,
}

/// Result of scanning positions for rolls.
#[derive(Debug, Default)]
pub struct RollScan {
    /// Positions that qualify.
    pub candidates: Vec<RollCandidate>,
    /// Option positions whose symbols could not be decoded.
    pub skipped: Vec<(String, OptionSymbolError)>,
}

/// Find short puts within `days_before_expiry` of expiry on roll-enabled underlyings.
#[must_use]
pub fn identify_rollable(positions: &[Position], policy: &RollPolicy, today: NaiveDate) -> RollScan {
    let mut scan = RollScan::default();

    for position in positions.iter().filter(|p| p.is_option() && p.qty < 0) {
        let option = match position.option_symbol() {
            Ok(option) => option,
            Err(err) => {
                scan.skipped.push((position.symbol.clone(), err));
                continue;
            }
        };

        if option.option_type != OptionType::Put || !policy.is_enabled_for(&option.underlying) {
            continue;
        }

        let days_to_expiry = option.days_to_expiry(today);
        if days_to_expiry <= policy.settings.days_before_expiry {
            scan.candidates.push(RollCandidate {
                symbol: position.symbol.clone(),
                underlying: option.underlying,
                strike: option.strike,
                expiration: option.expiration,
                days_to_expiry,
                quantity: position.abs_qty(),
            });
        }
    }

    scan
}

/// Whether `target` is an admissible replacement for `current` under `strategy`.
#[must_use]
pub fn matches_strategy(strategy: RollStrategy, current: &RollCandidate, target: &OptionCandidate) -> bool {
    if target.dte <= current.days_to_expiry {
        return false;
    }
    match strategy {
        RollStrategy::Forward => target.strike >= current.strike,
        RollStrategy::Down => target.strike < current.strike,
        RollStrategy::Both => true,
    }
}
