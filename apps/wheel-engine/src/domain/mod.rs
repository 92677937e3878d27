//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! Everything here is synchronous and deterministic given its inputs.
//!
//! # Bounded Contexts
//!
//! - [`wheel`]: OCC symbols, positions, and wheel state derivation
//! - [`selection`]: Option screening, scoring, and per-underlying selection
//! - [`rolling`]: Near-expiry put identification and roll target rules
//! - [`capacity`]: Buying power available to new puts
//! - [`market_hours`]: Regular session gating in New York time

pub mod capacity;
pub mod market_hours;
pub mod rolling;
pub mod selection;
pub mod wheel;
