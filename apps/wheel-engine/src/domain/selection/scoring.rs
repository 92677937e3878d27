//! Filter, score, and select option candidates.
//!
//! The score is the annualized return on selling the contract, discounted by
//! the probability of assignment (approximated by |delta|):
//!
//! ```text
//! score = (1 - |delta|) * (250 / (dte + 5)) * (bid / strike)
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::candidate::OptionCandidate;
use super::filters::OptionFilters;
use crate::domain::wheel::{CONTRACT_MULTIPLIER, PositionCounts};

/// Candidate selector driven by [`OptionFilters`].
#[derive(Debug, Clone, Default)]
pub struct ScoringSelector {
    filters: OptionFilters,
}

impl ScoringSelector {
    /// Create a selector.
    #[must_use]
    pub const fn new(filters: OptionFilters) -> Self {
        Self { filters }
    }

    /// Active thresholds.
    #[must_use]
    pub const fn filters(&self) -> &OptionFilters {
        &self.filters
    }

    /// Keep candidates inside the delta, yield, and open-interest bands with
    /// `strike >= min_strike`. Missing delta or open interest fails.
    #[must_use]
    pub fn filter(&self, candidates: &[OptionCandidate], min_strike: Decimal) -> Vec<OptionCandidate> {
        candidates
            .iter()
            .filter(|c| self.passes(c, min_strike))
            .cloned()
            .collect()
    }

    fn passes(&self, candidate: &OptionCandidate, min_strike: Decimal) -> bool {
        let f = &self.filters;

        let Some(delta) = candidate.delta.map(f64::abs) else {
            return false;
        };
        if !(delta > f.delta_min && delta < f.delta_max) {
            return false;
        }

        let Some(ratio) = bid_strike_ratio(candidate) else {
            return false;
        };
        #[allow(clippy::cast_precision_loss)]
        let annualized = ratio * (365.0 / (candidate.dte + 1) as f64);
        if !(annualized > f.yield_min && annualized < f.yield_max) {
            return false;
        }

        match candidate.open_interest {
            Some(oi) if oi > f.open_interest_min => {}
            _ => return false,
        }

        candidate.strike >= min_strike
    }

    /// Score each candidate. Candidates without delta score zero.
    #[must_use]
    pub fn score(&self, candidates: &[OptionCandidate]) -> Vec<f64> {
        candidates.iter().map(score_one).collect()
    }

    /// Pick the best candidates per underlying.
    ///
    /// Drops scores at or below `score_min`, ranks each underlying's candidates
    /// by score, orders underlyings by their best score, and takes up to
    /// `max_per_symbol - current puts` from each. `limit` caps the total.
    /// Ties keep input order.
    #[must_use]
    pub fn select(
        &self,
        candidates: &[OptionCandidate],
        scores: &[f64],
        max_per_symbol: u32,
        counts: &BTreeMap<String, PositionCounts>,
        limit: Option<usize>,
    ) -> Vec<OptionCandidate> {
        let mut groups: Vec<(&str, Vec<(&OptionCandidate, f64)>)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for (candidate, &score) in candidates.iter().zip(scores) {
            if score <= self.filters.score_min {
                continue;
            }
            let key = candidate.underlying.as_str();
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push((candidate, score));
        }

        for (_, group) in &mut groups {
            group.sort_by(|a, b| descending(a.1, b.1));
        }
        groups.sort_by(|a, b| descending(a.1[0].1, b.1[0].1));

        let mut selected = Vec::new();
        for (underlying, group) in groups {
            let held = counts.get(underlying).map_or(0, |c| c.puts);
            let room = max_per_symbol.saturating_sub(held) as usize;

            for (candidate, _) in group.into_iter().take(room) {
                if limit.is_some_and(|n| selected.len() >= n) {
                    return selected;
                }
                selected.push(candidate.clone());
            }
        }

        selected
    }

    /// Underlyings whose 100-share lot fits inside `buying_power`, sorted.
    #[must_use]
    pub fn filter_underlyings<S: std::hash::BuildHasher>(
        &self,
        latest_prices: &HashMap<String, Decimal, S>,
        buying_power: Decimal,
    ) -> Vec<String> {
        let lot = Decimal::from(CONTRACT_MULTIPLIER);
        let mut affordable: Vec<String> = latest_prices
            .iter()
            .filter(|(_, price)| lot * **price <= buying_power)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        affordable.sort();
        affordable
    }
}

fn bid_strike_ratio(candidate: &OptionCandidate) -> Option<f64> {
    if candidate.strike.is_zero() {
        return None;
    }
    (candidate.bid / candidate.strike).to_f64()
}

fn score_one(candidate: &OptionCandidate) -> f64 {
    let (Some(delta), Some(ratio)) = (candidate.delta, bid_strike_ratio(candidate)) else {
        return 0.0;
    };
    #[allow(clippy::cast_precision_loss)]
    let time_factor = 250.0 / (candidate.dte + 5) as f64;
    (1.0 - delta.abs()) * time_factor * ratio
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
