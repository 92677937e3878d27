//! Option screening thresholds.

use serde::{Deserialize, Serialize};

/// Thresholds applied to option candidates before scoring.
///
/// Bounds on delta and yield are exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionFilters {
    /// Lower bound on |delta|.
    #[serde(default = "default_delta_min")]
    pub delta_min: f64,
    /// Upper bound on |delta|.
    #[serde(default = "default_delta_max")]
    pub delta_max: f64,
    /// Lower bound on annualized yield.
    #[serde(default = "default_yield_min")]
    pub yield_min: f64,
    /// Upper bound on annualized yield.
    #[serde(default = "default_yield_max")]
    pub yield_max: f64,
    /// Shortest expiration considered, in days.
    #[serde(default)]
    pub expiration_min_days: u32,
    /// Longest expiration considered, in days.
    #[serde(default = "default_expiration_max_days")]
    pub expiration_max_days: u32,
    /// Open interest must exceed this.
    #[serde(default = "default_open_interest_min")]
    pub open_interest_min: u64,
    /// Scores at or below this are discarded.
    #[serde(default = "default_score_min")]
    pub score_min: f64,
}

impl Default for OptionFilters {
    fn default() -> Self {
        Self {
            delta_min: default_delta_min(),
            delta_max: default_delta_max(),
            yield_min: default_yield_min(),
            yield_max: default_yield_max(),
            expiration_min_days: 0,
            expiration_max_days: default_expiration_max_days(),
            open_interest_min: default_open_interest_min(),
            score_min: default_score_min(),
        }
    }
}

const fn default_delta_min() -> f64 {
    0.15
}

const fn default_delta_max() -> f64 {
    0.30
}

const fn default_yield_min() -> f64 {
    0.04
}

const fn default_yield_max() -> f64 {
    1.00
}

const fn default_expiration_max_days() -> u32 {
    21
}

const fn default_open_interest_min() -> u64 {
    100
}

const fn default_score_min() -> f64 {
    0.05
}
