//! Fixed-point monetary amounts with two fractional digits.
//!
//! Prices, sale values and taxes are `NUMERIC(18, 2)` columns. A [`Money`]
//! holds the exact number of hundredths as an `i64`, which covers all
//! 18-digit values without any floating-point rounding.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Number of fractional digits carried by every amount.
pub const SCALE: u32 = 2;

/// An exact amount in hundredths of a currency unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// Build from a count of hundredths. No precision bound is applied here;
    /// use [`Money::fits`] to check against a column's declared precision.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Build from whole units, failing on overflow.
    pub fn from_units(units: i64) -> Result<Self> {
        units
            .checked_mul(100)
            .map(Self)
            .ok_or_else(|| Error::invalid_input(format!("amount {units} overflows")))
    }

    /// The amount in hundredths.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Whether this amount fits a `NUMERIC(precision, 2)` column.
    #[must_use]
    pub fn fits(self, precision: u32) -> bool {
        match 10u64.checked_pow(precision) {
            Some(limit) => self.0.unsigned_abs() < limit,
            None => true,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Parse `"1234"`, `"1234.5"` or `"-1234.56"`. More than two fractional
    /// digits is an error rather than a silent rounding.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::invalid_input(format!("invalid amount '{s}'"));
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (units, frac) = match body.split_once('.') {
            Some((u, f)) => (u, f),
            None => (body, ""),
        };
        if units.is_empty() || !units.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > SCALE as usize || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if body.ends_with('.') {
            return Err(invalid());
        }

        let units: i64 = units.parse().map_err(|_| invalid())?;
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        let cents = units
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_forms() {
        assert_eq!("1234".parse::<Money>().unwrap().cents(), 123_400);
        assert_eq!("1234.5".parse::<Money>().unwrap().cents(), 123_450);
        assert_eq!("1234.56".parse::<Money>().unwrap().cents(), 123_456);
        assert_eq!("-0.07".parse::<Money>().unwrap().cents(), -7);
        assert_eq!(" 10.00 ".parse::<Money>().unwrap(), Money::from_units(10).unwrap());
    }

    #[test]
    fn parse_rejects_extra_precision() {
        assert!("1.234".parse::<Money>().is_err());
        assert!("1.".parse::<Money>().is_err());
        assert!(".5".parse::<Money>().is_err());
        assert!("1,5".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
        assert!("99999999999999999999".parse::<Money>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Money::from_cents(123_456).to_string(), "1234.56");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-150).to_string(), "-1.50");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn precision_bound() {
        let max = Money::from_cents(999_999_999_999_999_999);
        assert!(max.fits(18));
        assert!(!Money::from_cents(1_000_000_000_000_000_000).fits(18));
        assert!(!Money::from_cents(i64::MIN).fits(18));
        assert!(Money::from_cents(9_999).fits(4));
        assert!(!Money::from_cents(10_000).fits(4));
    }

    #[test]
    fn serde_as_string() {
        let m = Money::from_cents(250_000_050);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"2500000.50\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
