//! Precision Handling for Exchange Increments
//!
//! KuCoin publishes the smallest tradable step of every instrument as a decimal string
//! (`baseIncrement`, `priceIncrement`). The number of decimal places in that string is the
//! precision every derived price must be rounded to.
//!
//! ## Critical Rules
//!
//! 1. **NO FLOATING POINT**: prices are `Decimal`
//! 2. **Round at the instrument's scale**: use [`round_to_precision`] with the instrument's
//!    quote precision before comparing against live prices
//!
//! ```rust
//! use types::precision::{decimal_places, round_to_precision};
//! use rust_decimal::Decimal;
//! use std::str::FromStr;
//!
//! assert_eq!(decimal_places("0.0001").unwrap(), 4);
//! assert_eq!(decimal_places("1").unwrap(), 0);
//!
//! let price = Decimal::from_str("1.234567").unwrap();
//! assert_eq!(round_to_precision(price, 4), Decimal::from_str("1.2346").unwrap());
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while deriving precision from exchange increments
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PrecisionError {
    /// Increment string is not a decimal number
    #[error("Invalid increment: '{input}' - expected decimal format")]
    InvalidIncrement {
        /// The raw value received from the exchange
        input: String,
    },

    /// Increment must be strictly positive
    #[error("Increment must be positive, got {input}")]
    NonPositive {
        /// The raw value received from the exchange
        input: String,
    },
}

pub type Result<T> = std::result::Result<T, PrecisionError>;

/// Number of decimal places expressed by an exchange increment such as `"0.001"`
///
/// Trailing zeros are ignored, so `"0.0010"` yields 3.
pub fn decimal_places(increment: &str) -> Result<u32> {
    let value = Decimal::from_str(increment.trim()).map_err(|_| PrecisionError::InvalidIncrement {
        input: increment.to_string(),
    })?;

    if value <= Decimal::ZERO {
        return Err(PrecisionError::NonPositive {
            input: increment.to_string(),
        });
    }

    Ok(value.normalize().scale())
}

/// Round half away from zero to `places` decimal places
#[inline]
pub fn round_to_precision(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}
