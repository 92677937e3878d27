//! Wheel Bounded Context
//!
//! Derives the authoritative per-underlying wheel state from raw broker
//! positions.
//!
//! # Key Concepts
//!
//! - **Position**: read-only broker view (equity or OCC option)
//! - **`WheelState`**: where an underlying sits in the put → shares → call cycle
//! - **`PositionCounts`**: open puts, calls and 100-share lots per underlying
//! - **Risk**: capital deployed in shares plus put assignment exposure

pub mod errors;
pub mod occ;
pub mod position;
pub mod state;

pub use errors::{DataIntegrityError, OptionSymbolError};
pub use occ::{OptionSymbol, OptionType, encode_strike};
pub use position::{AssetClass, Position};
pub use state::{
    CONTRACT_MULTIPLIER, PositionCounts, WheelState, WheelStateKind, calculate_risk,
    count_positions, derive_state,
};
