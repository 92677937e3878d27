//! Thread-safe cache of the last derived wheel state.
//!
//! Each call recomputes from the positions it is given, stores the result, and
//! hands back a clone. Nothing is mutated incrementally.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::wheel::{
    DataIntegrityError, OptionSymbolError, Position, PositionCounts, WheelState, calculate_risk,
    count_positions, derive_state,
};

#[derive(Debug, Default)]
struct Snapshot {
    states: BTreeMap<String, WheelState>,
    counts: BTreeMap<String, PositionCounts>,
    risk: Decimal,
}

/// Shared holder for the most recent derivation.
#[derive(Debug, Default)]
pub struct StateManager {
    inner: Mutex<Snapshot>,
}

impl StateManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive and store wheel states.
    pub fn update_state(
        &self,
        positions: &[Position],
    ) -> Result<BTreeMap<String, WheelState>, DataIntegrityError> {
        let states = derive_state(positions)?;
        self.inner.lock().states.clone_from(&states);
        Ok(states)
    }

    /// Count and store positions per underlying.
    pub fn count_positions(
        &self,
        positions: &[Position],
    ) -> Result<BTreeMap<String, PositionCounts>, OptionSymbolError> {
        let counts = count_positions(positions)?;
        self.inner.lock().counts.clone_from(&counts);
        Ok(counts)
    }

    /// Compute and store capital at risk.
    pub fn calculate_risk(&self, positions: &[Position]) -> Result<Decimal, OptionSymbolError> {
        let risk = calculate_risk(positions)?;
        self.inner.lock().risk = risk;
        Ok(risk)
    }

    /// Last derived state for `symbol`.
    #[must_use]
    pub fn get_state(&self, symbol: &str) -> Option<WheelState> {
        self.inner.lock().states.get(symbol).cloned()
    }

    /// Last counts for `symbol` (zeros if unseen).
    #[must_use]
    pub fn get_position_count(&self, symbol: &str) -> PositionCounts {
        self.inner
            .lock()
            .counts
            .get(symbol)
            .copied()
            .unwrap_or_default()
    }

    /// Last computed risk.
    #[must_use]
    pub fn get_current_risk(&self) -> Decimal {
        self.inner.lock().risk
    }

    /// Whether `symbol` has a free wheel layer.
    #[must_use]
    pub fn is_position_allowed(&self, symbol: &str, max_layers: u32) -> bool {
        self.get_position_count(symbol).layers() < max_layers
    }

    /// Forget everything.
    pub fn reset(&self) {
        *self.inner.lock() = Snapshot::default();
    }
}
