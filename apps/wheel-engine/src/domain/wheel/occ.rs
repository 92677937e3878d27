//! OCC option symbology.
//!
//! Layout: `ROOT YYMMDD [P|C] SSSSSSSS` with no separators, where the strike
//! is scaled by 1000 and zero-padded to eight digits.
//!
//! ```text
//! AAPL241220P00150000 → AAPL, 2024-12-20, Put, 150.000
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::errors::OptionSymbolError;

/// Strike scale factor (three implied decimals).
const STRIKE_SCALE: u32 = 3;

/// Put or call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// Put option.
    Put,
    /// Call option.
    Call,
}

impl OptionType {
    /// The OCC type character.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Put => 'P',
            Self::Call => 'C',
        }
    }

    /// Parse an OCC type character.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'P' => Some(Self::Put),
            'C' => Some(Self::Call),
            _ => None,
        }
    }

    /// Alpaca contract `type` query value.
    #[must_use]
    pub const fn as_api_str(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Call => "call",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A decoded OCC option symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionSymbol {
    /// Underlying root.
    pub underlying: String,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Put or call.
    pub option_type: OptionType,
    /// Strike price.
    pub strike: Decimal,
}

impl OptionSymbol {
    /// Create a symbol from its parts.
    #[must_use]
    pub fn new(
        underlying: impl Into<String>,
        expiration: NaiveDate,
        option_type: OptionType,
        strike: Decimal,
    ) -> Self {
        Self {
            underlying: underlying.into(),
            expiration,
            option_type,
            strike,
        }
    }

    /// Decode an OCC symbol.
    ///
    /// The underlying is everything before the first digit; the next six
    /// characters are the expiration, then one type character, then the
    /// strike digits divided by 1000.
    pub fn parse(symbol: &str) -> Result<Self, OptionSymbolError> {
        if !symbol.is_ascii() {
            return Err(OptionSymbolError::MissingUnderlying {
                symbol: symbol.to_string(),
            });
        }

        let root_len = symbol
            .find(|c: char| c.is_ascii_digit())
            .filter(|&idx| idx > 0)
            .ok_or_else(|| OptionSymbolError::MissingUnderlying {
                symbol: symbol.to_string(),
            })?;

        let rest = &symbol[root_len..];
        if rest.len() < 8 {
            return Err(OptionSymbolError::TooShort {
                symbol: symbol.to_string(),
            });
        }

        let date_raw = &rest[..6];
        let expiration = parse_yymmdd(date_raw).ok_or_else(|| {
            OptionSymbolError::InvalidExpiration {
                symbol: symbol.to_string(),
                raw: date_raw.to_string(),
            }
        })?;

        let type_char = char::from(rest.as_bytes()[6]);
        let option_type =
            OptionType::from_char(type_char).ok_or_else(|| OptionSymbolError::InvalidType {
                symbol: symbol.to_string(),
                found: type_char,
            })?;

        let strike_raw = &rest[7..];
        let scaled = strike_raw
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| strike_raw.parse::<i64>().ok())
            .flatten()
            .ok_or_else(|| OptionSymbolError::InvalidStrike {
                symbol: symbol.to_string(),
                raw: strike_raw.to_string(),
            })?;

        Ok(Self {
            underlying: symbol[..root_len].to_string(),
            expiration,
            option_type,
            strike: Decimal::new(scaled, STRIKE_SCALE),
        })
    }

    /// Encode back to an OCC symbol.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{:02}{:02}{:02}{}{}",
            self.underlying,
            self.expiration.year() % 100,
            self.expiration.month(),
            self.expiration.day(),
            self.option_type.as_char(),
            encode_strike(self.strike),
        )
    }

    /// Calendar days from `today` until expiration (negative once past).
    #[must_use]
    pub fn days_to_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiration - today).num_days()
    }
}

impl FromStr for OptionSymbol {
    type Err = OptionSymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OptionSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Encode a strike as eight zero-padded digits of thousandths.
#[must_use]
pub fn encode_strike(strike: Decimal) -> String {
    let scaled = (strike * Decimal::from(1000)).round().to_i64().unwrap_or(0);
    format!("{scaled:08}")
}

fn parse_yymmdd(raw: &str) -> Option<NaiveDate> {
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let yy: i32 = raw[0..2].parse().ok()?;
    let mm: u32 = raw[2..4].parse().ok()?;
    let dd: u32 = raw[4..6].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + yy, mm, dd)
}
