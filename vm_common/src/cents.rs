use std::{
    fmt::{self, Display},
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{
    de::{self, Visitor},
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of decimal places carried by a [`Cents`] value when rendered as a currency amount.
pub const CURRENCY_DECIMALS: u32 = 2;
const SCALE: i64 = 100;
const FLOAT_TOLERANCE: f64 = 1e-6;

//--------------------------------------        Cents          ---------------------------------------------------------
/// A fixed-point currency amount with two decimal places, stored as a whole number of cents.
///
/// On the wire, amounts are plain decimal numbers (`1.5`) or decimal strings (`"1.50"`), which is what the vending
/// machines and the web payment page send. Internally, all arithmetic is integer arithmetic.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(CentsConversionError(format!("{value} is not a finite number")));
        }
        let scaled = value * SCALE as f64;
        let cents = scaled.round();
        // Binary representation noise is tolerated. A real third decimal place is not.
        if (scaled - cents).abs() > FLOAT_TOLERANCE {
            return Err(CentsConversionError(format!("{value} has more than {CURRENCY_DECIMALS} decimal places")));
        }
        if cents.abs() > i64::MAX as f64 {
            return Err(CentsConversionError(format!("{value} is too large")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }
}

impl FromStr for Cents {
    type Err = CentsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        let valid = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() && frac.is_empty() || !valid(whole) || !valid(frac) {
            return Err(CentsConversionError(format!("'{s}' is not a decimal number")));
        }
        if frac.len() > CURRENCY_DECIMALS as usize {
            return Err(CentsConversionError(format!("'{s}' has more than {CURRENCY_DECIMALS} decimal places")));
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|e| CentsConversionError(e.to_string()))? };
        let frac = format!("{frac:0<2}").parse::<i64>().map_err(|e| CentsConversionError(e.to_string()))?;
        let value = whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| CentsConversionError(format!("'{s}' is too large")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / SCALE as u64, abs % SCALE as u64)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_units(units: i64) -> Self {
        Self(units * SCALE)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The amount as a floating point number of currency units. Only use this for presentation.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

impl Serialize for Cents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Cents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CentsVisitor)
    }
}

struct CentsVisitor;

impl<'de> Visitor<'de> for CentsVisitor {
    type Value = Cents;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal currency amount, as a number or a string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        v.checked_mul(SCALE).map(Cents).ok_or_else(|| E::custom(format!("{v} is too large")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let v = i64::try_from(v).map_err(|_| E::custom(format!("{v} is too large")))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Cents::try_from(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_decimal_strings() {
        assert_eq!("1.50".parse::<Cents>().unwrap(), Cents::from(150));
        assert_eq!("1.5".parse::<Cents>().unwrap(), Cents::from(150));
        assert_eq!("2".parse::<Cents>().unwrap(), Cents::from(200));
        assert_eq!(".25".parse::<Cents>().unwrap(), Cents::from(25));
        assert_eq!("-0.05".parse::<Cents>().unwrap(), Cents::from(-5));
        assert!("1.505".parse::<Cents>().is_err());
        assert!("abc".parse::<Cents>().is_err());
        assert!(".".parse::<Cents>().is_err());
        assert!("".parse::<Cents>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Cents::from(150).to_string(), "1.50");
        assert_eq!(Cents::from(5).to_string(), "0.05");
        assert_eq!(Cents::from(-125).to_string(), "-1.25");
        assert_eq!(Cents::default().to_string(), "0.00");
    }

    #[test]
    fn arithmetic() {
        let price = Cents::from(125);
        let paid = Cents::from_units(2);
        assert_eq!(paid - price, Cents::from(75));
        assert_eq!(price * 3, Cents::from(375));
        assert_eq!(vec![price, paid].into_iter().sum::<Cents>(), Cents::from(325));
        assert!(paid > price);
    }

    #[test]
    fn serde_accepts_numbers_and_strings() {
        let v: Cents = serde_json::from_str("1.5").unwrap();
        assert_eq!(v, Cents::from(150));
        let v: Cents = serde_json::from_str("2").unwrap();
        assert_eq!(v, Cents::from(200));
        let v: Cents = serde_json::from_str("\"0.99\"").unwrap();
        assert_eq!(v, Cents::from(99));
        // 0.1 + 0.2 style float noise is rounded away
        let v: Cents = serde_json::from_str("0.30000000000000004").unwrap();
        assert_eq!(v, Cents::from(30));
        assert_eq!(serde_json::to_string(&Cents::from(150)).unwrap(), "1.5");
    }

    #[test]
    fn floats_and_strings_agree_on_precision() {
        assert!(Cents::try_from(1.505).is_err());
        assert!(serde_json::from_str::<Cents>("1.505").is_err());
        assert!(serde_json::from_str::<Cents>("\"1.505\"").is_err());
        assert!(serde_json::from_str::<Cents>("0.001").is_err());
        assert_eq!(Cents::try_from(1.15).unwrap(), Cents::from(115));
        assert_eq!(Cents::try_from(-0.07).unwrap(), Cents::from(-7));
        assert!(Cents::try_from(f64::NAN).is_err());
    }
}
