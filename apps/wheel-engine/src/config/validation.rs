//! Configuration validation.

use rust_decimal::Decimal;

use super::{Config, ConfigError};

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// Validate configuration values.
pub(super) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let balance = &config.strategy.balance;
    if balance.allocation_percentage <= Decimal::ZERO || balance.allocation_percentage > Decimal::ONE
    {
        return Err(invalid(
            "strategy.balance.allocation_percentage must be in (0, 1]",
        ));
    }
    if balance.max_wheel_layers == 0 {
        return Err(invalid("strategy.balance.max_wheel_layers must be at least 1"));
    }

    let filters = &config.strategy.option_filters;
    if filters.delta_min < 0.0 || filters.delta_max > 1.0 {
        return Err(invalid("strategy.option_filters delta bounds must be in [0, 1]"));
    }
    if filters.delta_min >= filters.delta_max {
        return Err(invalid(
            "strategy.option_filters.delta_min must be below delta_max",
        ));
    }
    if filters.yield_min >= filters.yield_max {
        return Err(invalid(
            "strategy.option_filters.yield_min must be below yield_max",
        ));
    }
    if filters.expiration_min_days > filters.expiration_max_days {
        return Err(invalid(
            "strategy.option_filters.expiration_min_days must not exceed expiration_max_days",
        ));
    }

    if config.strategy.default_contracts < 1 {
        return Err(invalid("strategy.default_contracts must be at least 1"));
    }
    for (symbol, settings) in &config.strategy.symbols {
        if settings.contracts.is_some_and(|c| c < 1) {
            return Err(invalid(format!(
                "strategy.symbols.{symbol}.contracts must be at least 1"
            )));
        }
    }

    let rolling = &config.strategy.rolling;
    if rolling.days_before_expiry < 0 {
        return Err(invalid("strategy.rolling.days_before_expiry must not be negative"));
    }
    if rolling.min_premium_to_roll < Decimal::ZERO {
        return Err(invalid("strategy.rolling.min_premium_to_roll must not be negative"));
    }

    let runtime = &config.runtime;
    for (name, value) in [
        ("update_interval_secs", runtime.update_interval_secs),
        ("cycle_interval_secs", runtime.cycle_interval_secs),
        ("max_order_age_secs", runtime.max_order_age_secs),
        ("market_check_interval_secs", runtime.market_check_interval_secs),
    ] {
        if value == 0 {
            return Err(invalid(format!("runtime.{name} must be positive")));
        }
    }

    config.broker.environment()?;
    let retry = &config.broker.retry;
    if retry.max_attempts == 0 {
        return Err(invalid("broker.retry.max_attempts must be at least 1"));
    }
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        return Err(invalid("broker.retry.jitter_factor must be in [0, 1]"));
    }
    if retry.backoff_multiplier < 1.0 {
        return Err(invalid("broker.retry.backoff_multiplier must be at least 1.0"));
    }

    if config.ledger.max_connections == 0 {
        return Err(invalid("ledger.max_connections must be positive"));
    }

    Ok(())
}
