//! Strategy configuration: allocation, screening, symbols and rolling.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::use_cases::ContractSizing;
use crate::domain::rolling::{RollPolicy, RollingSettings, SymbolRollOverride};
use crate::domain::selection::OptionFilters;

/// Strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Buying power allocation and layer limit.
    #[serde(default)]
    pub balance: BalanceConfig,
    /// Option screening thresholds.
    #[serde(default)]
    pub option_filters: OptionFilters,
    /// Per-underlying settings, keyed by ticker.
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolConfig>,
    /// Contracts per order when a symbol sets none.
    #[serde(default = "default_contracts")]
    pub default_contracts: i64,
    /// Global rolling settings.
    #[serde(default)]
    pub rolling: RollingSettings,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            balance: BalanceConfig::default(),
            option_filters: OptionFilters::default(),
            symbols: BTreeMap::new(),
            default_contracts: default_contracts(),
            rolling: RollingSettings::default(),
        }
    }
}

impl StrategyConfig {
    /// Enabled underlyings in ticker order.
    #[must_use]
    pub fn enabled_symbols(&self) -> Vec<String> {
        self.symbols
            .iter()
            .filter(|(_, s)| s.enabled)
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    /// Contract sizing with per-symbol overrides.
    #[must_use]
    pub fn contract_sizing(&self) -> ContractSizing {
        ContractSizing {
            default_contracts: self.default_contracts,
            per_symbol: self
                .symbols
                .iter()
                .filter_map(|(symbol, s)| s.contracts.map(|c| (symbol.clone(), c)))
                .collect(),
        }
    }

    /// Rolling settings with per-symbol overrides.
    #[must_use]
    pub fn roll_policy(&self) -> RollPolicy {
        let overrides: HashMap<String, SymbolRollOverride> = self
            .symbols
            .iter()
            .map(|(symbol, s)| (symbol.clone(), s.rolling))
            .collect();
        RollPolicy {
            settings: self.rolling.clone(),
            overrides,
        }
    }
}

/// Buying power allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// Fraction of non-marginable buying power the strategy may use.
    #[serde(default = "default_allocation_percentage")]
    pub allocation_percentage: Decimal,
    /// Open puts plus share lots allowed per underlying.
    #[serde(default = "default_max_wheel_layers")]
    pub max_wheel_layers: u32,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            allocation_percentage: default_allocation_percentage(),
            max_wheel_layers: default_max_wheel_layers(),
        }
    }
}

/// One underlying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Whether the strategy trades this underlying.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Contracts per order, overriding `default_contracts`.
    #[serde(default)]
    pub contracts: Option<i64>,
    /// Rolling overrides.
    #[serde(default)]
    pub rolling: SymbolRollOverride,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            contracts: None,
            rolling: SymbolRollOverride::default(),
        }
    }
}

const fn default_allocation_percentage() -> Decimal {
    Decimal::from_parts(5, 0, 0, false, 1)
}

const fn default_max_wheel_layers() -> u32 {
    2
}

const fn default_contracts() -> i64 {
    1
}

const fn default_enabled() -> bool {
    true
}
