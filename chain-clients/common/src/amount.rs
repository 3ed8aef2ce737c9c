//! Fixed-Point Amounts
//!
//! Transfer values travel as decimal strings and are held as an unsigned integer
//! scaled by 10^18. Floating point never touches an amount. Conversion to a chain's
//! base units (wei, lamports, attoFIL, token decimals) is explicit and refuses to
//! drop precision.

use std::fmt;
use std::str::FromStr;

use ethereum_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of fractional digits carried by [`Amount`].
pub const AMOUNT_DECIMALS: u32 = 18;

const SCALE: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must not be negative: {0}")]
    Negative(String),
    #[error("invalid decimal amount: {0}")]
    Invalid(String),
    #[error("amount has more than {max} fractional digits: {value}")]
    TooPrecise { value: String, max: u32 },
    #[error("amount overflows the supported range")]
    Overflow,
}

/// Non-negative decimal amount with 18 fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Builds an amount from its scaled integer representation.
    pub const fn from_raw(raw: u128) -> Self {
        Amount(raw)
    }

    /// Builds an amount from a whole number of units.
    pub fn from_units(units: u64) -> Self {
        Amount(u128::from(units) * SCALE)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Returns `percent`% of this amount, rounded down.
    ///
    /// `percent` is itself an amount so that fractional percentages such as
    /// "0.25" keep their exact value.
    pub fn percentage(&self, percent: Amount) -> Option<Amount> {
        let product = U256::from(self.0) * U256::from(percent.0);
        let divisor = U256::from(100u8) * U256::from(SCALE);
        u256_to_u128(product / divisor).map(Amount)
    }

    /// Multiplies by an integer count (e.g., gas price times gas limit).
    pub fn checked_mul_u128(self, factor: u128) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }

    /// Converts to integer base units for a token with `decimals` places.
    ///
    /// # Returns
    ///
    /// * `Ok(u128)` - Exact base-unit value
    /// * `Err(AmountError)` - The amount has more precision than the token or overflows
    pub fn to_base_units(&self, decimals: u32) -> Result<u128, AmountError> {
        if decimals <= AMOUNT_DECIMALS {
            let divisor = pow10(AMOUNT_DECIMALS - decimals)?;
            if self.0 % divisor != 0 {
                return Err(AmountError::TooPrecise {
                    value: self.to_string(),
                    max: decimals,
                });
            }
            Ok(self.0 / divisor)
        } else {
            let factor = pow10(decimals - AMOUNT_DECIMALS)?;
            self.0.checked_mul(factor).ok_or(AmountError::Overflow)
        }
    }

    /// Converts integer base units for a token with `decimals` places into an amount.
    pub fn from_base_units(units: u128, decimals: u32) -> Result<Amount, AmountError> {
        if decimals <= AMOUNT_DECIMALS {
            let factor = pow10(AMOUNT_DECIMALS - decimals)?;
            units.checked_mul(factor).map(Amount).ok_or(AmountError::Overflow)
        } else {
            let divisor = pow10(decimals - AMOUNT_DECIMALS)?;
            Ok(Amount(units / divisor))
        }
    }
}

fn pow10(exp: u32) -> Result<u128, AmountError> {
    10u128.checked_pow(exp).ok_or(AmountError::Overflow)
}

fn u256_to_u128(value: U256) -> Option<u128> {
    if value > U256::from(u128::MAX) {
        None
    } else {
        Some(value.low_u128())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        if s.starts_with('-') {
            return Err(AmountError::Negative(s.to_string()));
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountError::Invalid(s.to_string()));
        }
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if frac.len() > AMOUNT_DECIMALS as usize {
            return Err(AmountError::TooPrecise {
                value: s.to_string(),
                max: AMOUNT_DECIMALS,
            });
        }

        let whole_value: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        let frac_value: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = AMOUNT_DECIMALS as usize);
            padded
                .parse()
                .map_err(|_| AmountError::Invalid(s.to_string()))?
        };

        whole_value
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac_value))
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            let frac_str = format!("{:018}", frac);
            write!(f, "{}.{}", whole, frac_str.trim_end_matches('0'))
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}
