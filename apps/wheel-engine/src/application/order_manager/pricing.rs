//! Limit price rules.
//!
//! Orders start at the rounded mid and walk toward the far side of the quote
//! one cent per reprice attempt, never past half the spread and never across
//! the quote.

use rust_decimal::Decimal;

use crate::application::ports::OrderSide;

const TICK: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
const HALF: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

fn round2(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// Opening limit price.
///
/// Sells start at `max(mid + adjustment, bid)`, buys at `min(mid + adjustment, ask)`.
#[must_use]
pub fn initial_limit_price(side: OrderSide, bid: Decimal, ask: Decimal, adjustment: Decimal) -> Decimal {
    let mid = round2((bid + ask) / Decimal::TWO);
    match side {
        OrderSide::Sell => (mid + adjustment).max(bid),
        OrderSide::Buy => (mid + adjustment).min(ask),
    }
}

/// Price to replace with after `attempts` prior reprices.
#[must_use]
pub fn reprice_price(side: OrderSide, bid: Decimal, ask: Decimal, attempts: u32) -> Decimal {
    let spread = ask - bid;
    let adjustment = (Decimal::from(attempts) * TICK).min(spread * HALF);
    match side {
        OrderSide::Sell => round2(bid.max(ask - adjustment)),
        OrderSide::Buy => round2(ask.min(bid + adjustment)),
    }
}

/// The side of the quote an order is aiming at.
#[must_use]
pub const fn target_price(side: OrderSide, bid: Decimal, ask: Decimal) -> Decimal {
    match side {
        OrderSide::Sell => bid,
        OrderSide::Buy => ask,
    }
}
