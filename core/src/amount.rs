//! Fixed-point money and percentages
//!
//! Amounts are whole cents held in an `i64`. Every percentage computation
//! rounds to the cent immediately, so level-by-level drift cannot compound.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use crate::error::CommissionError;

pub const CENTS_PER_UNIT: i64 = 100;

/// Basis points in 100%
const BASIS_POINTS: i64 = 10_000;

/// Signed money amount in cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    /// Whole currency units, e.g. `from_units(5000)` is 5000.00
    pub const fn from_units(units: i64) -> Self {
        Amount(units * CENTS_PER_UNIT)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `self × percent`, rounded half away from zero to the cent
    pub fn percent(self, pct: Percent) -> Amount {
        let scaled = self.0 as i128 * pct.basis_points() as i128;
        let half = BASIS_POINTS as i128 / 2;
        let rounded = if scaled >= 0 {
            (scaled + half) / BASIS_POINTS as i128
        } else {
            (scaled - half) / BASIS_POINTS as i128
        };
        Amount(rounded as i64)
    }

    /// Equal share per part, floored to the cent. Zero parts yield zero.
    pub fn split_floor(self, parts: u64) -> Amount {
        if parts == 0 || self.0 <= 0 {
            return Amount::ZERO;
        }
        Amount(self.0 / parts as i64)
    }

    pub fn times(self, n: u64) -> Amount {
        Amount(self.0.saturating_mul(n as i64))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + *a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:02}",
            sign,
            abs / CENTS_PER_UNIT as u64,
            abs % CENTS_PER_UNIT as u64
        )
    }
}

impl FromStr for Amount {
    type Err = CommissionError;

    /// Accepts `123`, `123.4`, `123.45` and a leading `-`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CommissionError::Validation(format!("Invalid amount: {}", s));
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = whole.parse().map_err(|_| invalid())?;
        let mut cents: i64 = if frac.is_empty() { 0 } else { frac.parse().map_err(|_| invalid())? };
        if frac.len() == 1 {
            cents *= 10;
        }

        let total = units
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|u| u.checked_add(cents))
            .ok_or_else(invalid)?;
        Ok(Amount(if negative { -total } else { total }))
    }
}

/// Serde adapter for human-facing config: amounts written as currency units
/// (`200` or `199.99`) instead of cents.
pub mod as_units {
    use super::{Amount, CENTS_PER_UNIT};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(amount.cents() as f64 / CENTS_PER_UNIT as f64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Amount, D::Error> {
        let units = f64::deserialize(d)?;
        if !units.is_finite() {
            return Err(de::Error::custom("amount must be finite"));
        }
        Ok(Amount::from_cents((units * CENTS_PER_UNIT as f64).round() as i64))
    }
}

/// A percentage stored as basis points (12.5% = 1250).
///
/// Serialized as a floating percentage so configuration reads naturally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Percent(u32);

impl Percent {
    pub const ZERO: Percent = Percent(0);

    pub const fn from_basis_points(bp: u32) -> Self {
        Percent(bp)
    }

    pub const fn basis_points(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<f64> for Percent {
    type Error = CommissionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(CommissionError::InvalidConfig(format!(
                "percentage out of range: {}",
                value
            )));
        }
        Ok(Percent((value * 100.0).round() as u32))
    }
}

impl From<Percent> for f64 {
    fn from(p: Percent) -> f64 {
        p.as_f64()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(v: f64) -> Percent {
        Percent::try_from(v).unwrap()
    }

    #[test]
    fn test_percent_of_sale() {
        let sale = Amount::from_units(5000);
        assert_eq!(sale.percent(pct(10.0)), Amount::from_units(500));
        assert_eq!(sale.percent(pct(5.0)), Amount::from_units(250));
        assert_eq!(sale.percent(pct(12.5)), Amount::from_units(625));
    }

    #[test]
    fn test_percent_rounds_to_cent() {
        // 0.33 * 33.33% = 0.109989 -> 0.11
        assert_eq!(Amount::from_cents(33).percent(pct(33.33)), Amount::from_cents(11));
        // 0.05 * 10% = 0.005 -> 0.01 (half away from zero)
        assert_eq!(Amount::from_cents(5).percent(pct(10.0)), Amount::from_cents(1));
        assert_eq!(Amount::from_cents(-5).percent(pct(10.0)), Amount::from_cents(-1));
    }

    #[test]
    fn test_split_floor() {
        assert_eq!(Amount::from_units(100).split_floor(4), Amount::from_units(25));
        assert_eq!(Amount::from_cents(100).split_floor(3), Amount::from_cents(33));
        assert_eq!(Amount::from_units(100).split_floor(0), Amount::ZERO);
        assert_eq!(Amount::ZERO.split_floor(5), Amount::ZERO);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("5000".parse::<Amount>().unwrap(), Amount::from_units(5000));
        assert_eq!("12.5".parse::<Amount>().unwrap(), Amount::from_cents(1250));
        assert_eq!("-0.07".parse::<Amount>().unwrap(), Amount::from_cents(-7));
        assert!("1.234".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        assert!(".5".parse::<Amount>().is_err());

        assert_eq!(Amount::from_cents(123456).to_string(), "1234.56");
        assert_eq!(Amount::from_cents(-7).to_string(), "-0.07");
    }

    #[test]
    fn test_percent_bounds() {
        assert!(Percent::try_from(-1.0).is_err());
        assert!(Percent::try_from(100.5).is_err());
        assert!(Percent::try_from(f64::NAN).is_err());
        assert_eq!(pct(0.5).basis_points(), 50);
    }

    #[test]
    fn test_percent_serde() {
        let p: Percent = serde_json::from_str("12.5").unwrap();
        assert_eq!(p.basis_points(), 1250);
        assert_eq!(serde_json::to_string(&p).unwrap(), "12.5");
    }
}
