//! Arbitrary-precision amounts used for every monetary and share quantity.
//!
//! The chain emits all quantities as base-10 strings. Two shapes occur:
//!
//! - [`Int`] -- a signed integer amount (token balances, voting power,
//!   minted quantities). Backed by a 256-bit signed integer.
//! - [`Dec`] -- a fixed-point decimal with exactly 18 fractional digits
//!   (shares, commission rates, USD values). Stored as a 256-bit signed
//!   integer scaled by `10^18`.
//!
//! Native floats never appear. All arithmetic is checked and overflow
//! surfaces as [`NumericError::Overflow`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::{I256, Sign, U256};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of fractional digits carried by [`Dec`].
pub const DEC_PRECISION: usize = 18;

/// `10^18`, the scale factor of [`Dec`].
const DEC_SCALE: u64 = 1_000_000_000_000_000_000;

/// Errors raised while parsing or combining numeric values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumericError {
    /// The input is not a valid base-10 integer.
    #[error("invalid integer: {0:?}")]
    InvalidInt(String),

    /// The input is not a valid decimal.
    #[error("invalid decimal: {0:?}")]
    InvalidDec(String),

    /// The result does not fit in 256 bits.
    #[error("numeric overflow in {0}")]
    Overflow(&'static str),
}

// =============================================================================
// Int
// =============================================================================

/// A signed 256-bit integer amount with a canonical base-10 representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Int(I256);

impl Int {
    /// The value zero.
    pub const ZERO: Self = Self(I256::ZERO);

    /// Parse a base-10 integer such as `"1000"` or `"-20"`.
    ///
    /// An empty string is rejected.
    pub fn parse(s: &str) -> Result<Self, NumericError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(NumericError::InvalidInt(s.to_owned()));
        }
        I256::from_dec_str(trimmed)
            .map(Self)
            .map_err(|_err| NumericError::InvalidInt(s.to_owned()))
    }

    /// Build from a primitive signed integer.
    pub fn from_i64(value: i64) -> Self {
        let sign = if value < 0 {
            Sign::Negative
        } else {
            Sign::Positive
        };
        let abs = U256::from(value.unsigned_abs());
        Self(I256::checked_from_sign_and_abs(sign, abs).unwrap_or(I256::ZERO))
    }

    /// Convert to `i64` if the value fits.
    pub fn to_i64(self) -> Option<i64> {
        self.0.to_string().parse().ok()
    }

    /// Whether the value is zero.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Whether the value is strictly negative.
    pub fn is_negative(self) -> bool {
        self.0.is_negative()
    }

    /// `self + rhs`.
    pub fn checked_add(self, rhs: Self) -> Result<Self, NumericError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(NumericError::Overflow("Int addition"))
    }

    /// `self - rhs`.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, NumericError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(NumericError::Overflow("Int subtraction"))
    }

    /// Add every item of an iterator to zero.
    pub fn checked_sum<I>(items: I) -> Result<Self, NumericError>
    where
        I: IntoIterator<Item = Self>,
    {
        items
            .into_iter()
            .try_fold(Self::ZERO, |acc, item| acc.checked_add(item))
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Int {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for Int {
    fn from(value: u64) -> Self {
        Self(I256::from_raw(U256::from(value)))
    }
}

impl Serialize for Int {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Int {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumberVisitor::<Self>::new("an integer string"))
    }
}

// =============================================================================
// Dec
// =============================================================================

/// An 18-decimal fixed-point value.
///
/// Parsing accepts at most 18 fractional digits; formatting always prints
/// exactly 18, so `"500"` round-trips as `"500.000000000000000000"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dec(I256);

impl Dec {
    /// The value zero.
    pub const ZERO: Self = Self(I256::ZERO);

    /// Parse a decimal such as `"0.05"`, `"-3"` or `"12.500000000000000000"`.
    pub fn parse(s: &str) -> Result<Self, NumericError> {
        let invalid = || NumericError::InvalidDec(s.to_owned());
        let trimmed = s.trim();
        let (sign, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (Sign::Negative, rest),
            None => (Sign::Positive, trimmed),
        };
        let (whole, frac) = body.split_once('.').unwrap_or((body, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac.len() > DEC_PRECISION {
            return Err(invalid());
        }

        let whole = if whole.is_empty() { "0" } else { whole };
        let whole = U256::from_str_radix(whole, 10).map_err(|_err| invalid())?;
        let padded = format!("{frac:0<width$}", width = DEC_PRECISION);
        let frac = U256::from_str_radix(&padded, 10).map_err(|_err| invalid())?;

        let abs = whole
            .checked_mul(scale())
            .and_then(|scaled| scaled.checked_add(frac))
            .ok_or(NumericError::Overflow("Dec parse"))?;
        I256::checked_from_sign_and_abs(sign, abs)
            .map(Self)
            .ok_or(NumericError::Overflow("Dec parse"))
    }

    /// Whether the value is zero.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Whether the value is strictly negative.
    pub fn is_negative(self) -> bool {
        self.0.is_negative()
    }

    /// `self + rhs`.
    pub fn checked_add(self, rhs: Self) -> Result<Self, NumericError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(NumericError::Overflow("Dec addition"))
    }

    /// `self - rhs`.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, NumericError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(NumericError::Overflow("Dec subtraction"))
    }
}

fn scale() -> U256 {
    U256::from(DEC_SCALE)
}

impl PartialOrd for Dec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sign, abs) = self.0.into_sign_and_abs();
        let (whole, frac) = abs.div_rem(scale());
        let prefix = if sign.is_negative() && !abs.is_zero() {
            "-"
        } else {
            ""
        };
        write!(
            f,
            "{prefix}{whole}.{:0>width$}",
            frac.to_string(),
            width = DEC_PRECISION
        )
    }
}

impl FromStr for Dec {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Int> for Dec {
    /// Saturates to zero if the integer is too large to scale.
    fn from(value: Int) -> Self {
        value
            .0
            .checked_mul(I256::from_raw(scale()))
            .map_or(Self::ZERO, Self)
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumberVisitor::<Self>::new("a decimal string"))
    }
}

// =============================================================================
// Serde
// =============================================================================

/// Accepts JSON strings and JSON integers for either numeric type.
struct NumberVisitor<T> {
    expecting: &'static str,
    marker: std::marker::PhantomData<T>,
}

impl<T> NumberVisitor<T> {
    const fn new(expecting: &'static str) -> Self {
        Self {
            expecting,
            marker: std::marker::PhantomData,
        }
    }
}

impl<T> Visitor<'_> for NumberVisitor<T>
where
    T: FromStr<Err = NumericError>,
{
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expecting)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<T, E> {
        self.visit_str(&v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<T, E> {
        self.visit_str(&v.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn int_parses_chain_amounts() {
        let big = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert!(Int::parse(big).is_err(), "2^256-1 does not fit a signed 256-bit value");

        let amount = Int::parse("1000000000000000000000").unwrap();
        assert_eq!(amount.to_string(), "1000000000000000000000");
        assert!(Int::parse("").is_err());
        assert!(Int::parse("12.5").is_err());
    }

    #[test]
    fn int_checked_arithmetic() {
        let a = Int::parse("1000").unwrap();
        let b = Int::parse("20").unwrap();
        assert_eq!(a.checked_sub(b).unwrap().to_string(), "980");
        assert_eq!(b.checked_sub(a).unwrap().to_string(), "-980");
        assert_eq!(Int::from_i64(-7).to_string(), "-7");
        assert_eq!(Int::from_i64(-7).to_i64(), Some(-7));
        assert_eq!(
            Int::checked_sum([a, b, Int::from(5_u64)]).unwrap().to_string(),
            "1025"
        );
    }

    #[test]
    fn dec_pads_and_prints_eighteen_digits() {
        assert_eq!(
            Dec::parse("500").unwrap().to_string(),
            "500.000000000000000000"
        );
        assert_eq!(
            Dec::parse("0.05").unwrap().to_string(),
            "0.050000000000000000"
        );
        assert_eq!(
            Dec::parse("-1.5").unwrap().to_string(),
            "-1.500000000000000000"
        );
        assert_eq!(Dec::parse(".5").unwrap().to_string(), "0.500000000000000000");
        assert!(Dec::parse("0.0000000000000000001").is_err());
        assert!(Dec::parse("1e5").is_err());
        assert!(Dec::parse("-").is_err());
    }

    #[test]
    fn dec_subtraction_keeps_precision() {
        let total = Dec::parse("100.25").unwrap();
        let own = Dec::parse("40.000000000000000001").unwrap();
        assert_eq!(
            total.checked_sub(own).unwrap().to_string(),
            "60.249999999999999999"
        );
        assert!(own < total);
    }

    #[test]
    fn serde_accepts_strings_and_numbers() {
        let from_str: Int = serde_json::from_str("\"42\"").unwrap();
        let from_num: Int = serde_json::from_str("42").unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(serde_json::to_string(&from_num).unwrap(), "\"42\"");

        let dec: Dec = serde_json::from_str("\"0.100000000000000000\"").unwrap();
        assert_eq!(dec, Dec::parse("0.1").unwrap());
        assert_eq!(Dec::from(Int::from(3_u64)), Dec::parse("3").unwrap());
    }
}
