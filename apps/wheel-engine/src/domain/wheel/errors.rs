//! Wheel domain errors.

use thiserror::Error;

use super::state::WheelStateKind;

/// Errors decoding an OCC option symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionSymbolError {
    /// Symbol has no alphabetic root before the first digit.
    #[error("Option symbol '{symbol}' has no underlying root")]
    MissingUnderlying {
        /// Raw symbol.
        symbol: String,
    },

    /// Symbol is too short to hold date, type and strike.
    #[error("Option symbol '{symbol}' is too short")]
    TooShort {
        /// Raw symbol.
        symbol: String,
    },

    /// Expiration is not a valid YYMMDD calendar date.
    #[error("Option symbol '{symbol}' has invalid expiration '{raw}'")]
    InvalidExpiration {
        /// Raw symbol.
        symbol: String,
        /// The six date characters.
        raw: String,
    },

    /// Type character is neither P nor C.
    #[error("Option symbol '{symbol}' has invalid type '{found}'")]
    InvalidType {
        /// Raw symbol.
        symbol: String,
        /// Offending character.
        found: char,
    },

    /// Strike portion is not numeric.
    #[error("Option symbol '{symbol}' has invalid strike '{raw}'")]
    InvalidStrike {
        /// Raw symbol.
        symbol: String,
        /// The strike characters.
        raw: String,
    },
}

/// Broker state broke the assumptions of the wheel model.
///
/// Always fatal for the cycle that observes it. The next cycle re-derives
/// from a fresh broker snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIntegrityError {
    /// Equity positions must be long.
    #[error("Only long stock positions allowed: {symbol} has qty {qty}")]
    NonPositiveEquity {
        /// Equity symbol.
        symbol: String,
        /// Observed quantity.
        qty: i64,
    },

    /// Option positions must be short.
    #[error("Only short option positions allowed: {symbol} has qty {qty}")]
    NonNegativeOption {
        /// Option symbol.
        symbol: String,
        /// Observed quantity.
        qty: i64,
    },

    /// A position cannot be combined with the state already derived for its underlying.
    #[error("Unexpected state for {underlying}: {existing} cannot absorb {incoming}")]
    ConflictingPosition {
        /// Underlying symbol.
        underlying: String,
        /// State derived so far.
        existing: WheelStateKind,
        /// Description of the incoming position.
        incoming: String,
    },

    /// An underlying finished derivation in an intermediate state.
    #[error("Invalid final state for {underlying}: {state}")]
    IncompleteState {
        /// Underlying symbol.
        underlying: String,
        /// Final state.
        state: WheelStateKind,
    },

    /// Option symbol could not be decoded.
    #[error(transparent)]
    Symbol(#[from] OptionSymbolError),
}
