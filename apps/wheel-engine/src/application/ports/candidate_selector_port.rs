//! Candidate Selector Port
//!
//! Synchronous seam between the orchestrator and the option screening rules.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::domain::selection::{OptionCandidate, OptionFilters, ScoringSelector};
use crate::domain::wheel::PositionCounts;

/// Port for screening, scoring and selecting option contracts.
pub trait CandidateSelector: Send + Sync {
    /// Keep candidates that pass the screening thresholds with `strike >= min_strike`.
    fn filter(&self, candidates: &[OptionCandidate], min_strike: Decimal) -> Vec<OptionCandidate>;

    /// One score per candidate, in input order.
    fn score(&self, candidates: &[OptionCandidate]) -> Vec<f64>;

    /// Best candidates per underlying, respecting `max_per_symbol` minus puts already held.
    fn select(
        &self,
        candidates: &[OptionCandidate],
        scores: &[f64],
        max_per_symbol: u32,
        counts: &BTreeMap<String, PositionCounts>,
        limit: Option<usize>,
    ) -> Vec<OptionCandidate>;

    /// Underlyings whose 100-share lot fits inside `buying_power`.
    fn filter_underlyings(
        &self,
        latest_prices: &HashMap<String, Decimal>,
        buying_power: Decimal,
    ) -> Vec<String>;

    /// Screening thresholds in force (for expiration windows).
    fn filters(&self) -> &OptionFilters;
}

impl CandidateSelector for ScoringSelector {
    fn filter(&self, candidates: &[OptionCandidate], min_strike: Decimal) -> Vec<OptionCandidate> {
        Self::filter(self, candidates, min_strike)
    }

    fn score(&self, candidates: &[OptionCandidate]) -> Vec<f64> {
        Self::score(self, candidates)
    }

    fn select(
        &self,
        candidates: &[OptionCandidate],
        scores: &[f64],
        max_per_symbol: u32,
        counts: &BTreeMap<String, PositionCounts>,
        limit: Option<usize>,
    ) -> Vec<OptionCandidate> {
        Self::select(self, candidates, scores, max_per_symbol, counts, limit)
    }

    fn filter_underlyings(
        &self,
        latest_prices: &HashMap<String, Decimal>,
        buying_power: Decimal,
    ) -> Vec<String> {
        Self::filter_underlyings(self, latest_prices, buying_power)
    }

    fn filters(&self) -> &OptionFilters {
        Self::filters(self)
    }
}
