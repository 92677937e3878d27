//! Loop timing and order lifecycle limits.

use serde::{Deserialize, Serialize};

use crate::application::order_manager::DEFAULT_MAX_ATTEMPTS;

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Seconds between fill reconciliation passes and between reprices.
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
    /// Seconds between strategy cycles.
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// Working orders older than this are canceled.
    #[serde(default = "default_max_order_age_secs")]
    pub max_order_age_secs: u64,
    /// Reprice attempts per order.
    #[serde(default = "default_max_reprice_attempts")]
    pub max_reprice_attempts: u32,
    /// Seconds between market-open checks while closed.
    #[serde(default = "default_market_check_interval_secs")]
    pub market_check_interval_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
            cycle_interval_secs: default_cycle_interval_secs(),
            max_order_age_secs: default_max_order_age_secs(),
            max_reprice_attempts: default_max_reprice_attempts(),
            market_check_interval_secs: default_market_check_interval_secs(),
        }
    }
}

const fn default_update_interval_secs() -> u64 {
    20
}

const fn default_cycle_interval_secs() -> u64 {
    60
}

const fn default_max_order_age_secs() -> u64 {
    60
}

const fn default_max_reprice_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_market_check_interval_secs() -> u64 {
    60
}
