//! Buying power available to new puts.

use rust_decimal::Decimal;

/// Balance the strategy may deploy: non-marginable buying power scaled by the allocation.
#[must_use]
pub fn allocated_balance(non_marginable_buying_power: Decimal, allocation_percentage: Decimal) -> Decimal {
    non_marginable_buying_power * allocation_percentage
}

/// Buying power usable for new puts this cycle.
///
/// The smaller of the broker's options buying power and the allocated balance,
/// floored at zero.
#[must_use]
pub fn usable_buying_power(options_buying_power: Decimal, allocated_balance: Decimal) -> Decimal {
    options_buying_power.min(allocated_balance).max(Decimal::ZERO)
}
