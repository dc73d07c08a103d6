//! The scaled decimal value type

use crate::error::{DecimalError, DecimalResult};
use crate::parse::parse_units;
use crate::rounding::{div_round, pow10, RoundingMode};
use crate::SCALE;
use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive, Zero};
use once_cell::sync::Lazy;
use std::fmt;
use std::ops;
use std::str::FromStr;

/// `10^SCALE`: the units of one whole
static ONE_UNITS: Lazy<BigInt> = Lazy::new(|| pow10(SCALE));

/// Largest integral exponent accepted by [`ScaledDecimal::pow`]
pub const MAX_POW_EXPONENT: i64 = 10_000;

/// Size limit of the exact intermediate power, in bits
const MAX_POW_BITS: u64 = 1 << 22;

/// An exact base-10 number with [`SCALE`] fractional digits
///
/// The value is stored as an arbitrary-precision integer count of
/// `10^-SCALE` units. Every operation returns a new value.
///
/// # Example
/// ```rust
/// use scalc_decimal::ScaledDecimal;
///
/// let price: ScaledDecimal = "1.005".parse().unwrap();
/// let total = price.mul(&ScaledDecimal::from(1000));
/// assert_eq!(total.to_string(), "1005");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ScaledDecimal {
    units: BigInt,
}

impl ScaledDecimal {
    /// Zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// One
    pub fn one() -> Self {
        Self {
            units: ONE_UNITS.clone(),
        }
    }

    /// Wrap a raw count of `10^-SCALE` units
    pub fn from_units(units: BigInt) -> Self {
        Self { units }
    }

    /// Raw count of `10^-SCALE` units
    pub fn units(&self) -> &BigInt {
        &self.units
    }

    /// Parse decimal text (see [`crate::is_decimal_literal`] for the grammar)
    pub fn parse(text: &str) -> DecimalResult<Self> {
        parse_units(text).map(Self::from_units)
    }

    pub fn is_zero(&self) -> bool {
        self.units.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.units.is_negative()
    }

    /// True when there is no fractional part
    pub fn is_integer(&self) -> bool {
        (&self.units % &*ONE_UNITS).is_zero()
    }

    pub fn abs(&self) -> Self {
        Self::from_units(self.units.abs())
    }

    /// `-1`, `0` or `1`
    pub fn signum(&self) -> Self {
        Self::from(match self.units.sign() {
            Sign::Minus => -1,
            Sign::NoSign => 0,
            Sign::Plus => 1,
        })
    }

    pub fn neg(&self) -> Self {
        Self::from_units(-&self.units)
    }

    pub fn add(&self, rhs: &Self) -> Self {
        Self::from_units(&self.units + &rhs.units)
    }

    pub fn sub(&self, rhs: &Self) -> Self {
        Self::from_units(&self.units - &rhs.units)
    }

    /// Multiply, rounding half-even back to the scale
    pub fn mul(&self, rhs: &Self) -> Self {
        self.mul_with(rhs, RoundingMode::HalfEven)
    }

    /// Multiply with an explicit rounding mode
    pub fn mul_with(&self, rhs: &Self, mode: RoundingMode) -> Self {
        let raw = &self.units * &rhs.units;
        Self::from_units(div_round(&raw, &ONE_UNITS, mode))
    }

    /// Divide, rounding half-even; dividing by zero is an error
    pub fn checked_div(&self, rhs: &Self) -> DecimalResult<Self> {
        self.div_with(rhs, RoundingMode::HalfEven)
    }

    /// Divide with an explicit rounding mode
    pub fn div_with(&self, rhs: &Self, mode: RoundingMode) -> DecimalResult<Self> {
        if rhs.is_zero() {
            return Err(DecimalError::DivideByZero);
        }
        let promoted = &self.units * &*ONE_UNITS;
        Ok(Self::from_units(div_round(&promoted, &rhs.units, mode)))
    }

    /// Truncated remainder: the result has the sign of the dividend
    pub fn rem(&self, rhs: &Self) -> DecimalResult<Self> {
        if rhs.is_zero() {
            return Err(DecimalError::DivideByZero);
        }
        Ok(Self::from_units(&self.units % &rhs.units))
    }

    /// Raise to a power
    ///
    /// Integral exponents are exact up to one final rounding. Other exponents
    /// go through `f64` and are only defined for non-negative bases.
    pub fn pow(&self, exponent: &Self) -> DecimalResult<Self> {
        if !exponent.is_integer() {
            return self.pow_fractional(exponent);
        }
        let n = exponent
            .to_i64()
            .filter(|n| n.abs() <= MAX_POW_EXPONENT)
            .filter(|n| self.units.bits().saturating_mul(n.unsigned_abs()) <= MAX_POW_BITS)
            .ok_or_else(|| DecimalError::ExponentOutOfRange(exponent.to_string()))?;

        match n {
            0 => Ok(Self::one()),
            n if n > 0 => {
                let n = n as u32;
                let raw = self.units.pow(n);
                let divisor = pow10(SCALE * (n - 1));
                Ok(Self::from_units(div_round(&raw, &divisor, RoundingMode::HalfEven)))
            }
            n => {
                if self.is_zero() {
                    return Err(DecimalError::DivideByZero);
                }
                let m = n.unsigned_abs() as u32;
                let numerator = pow10(SCALE * (m + 1));
                let denominator = self.units.pow(m);
                Ok(Self::from_units(div_round(
                    &numerator,
                    &denominator,
                    RoundingMode::HalfEven,
                )))
            }
        }
    }

    fn pow_fractional(&self, exponent: &Self) -> DecimalResult<Self> {
        if self.is_negative() {
            return Err(DecimalError::Unsupported(format!(
                "{} raised to non-integer power {}",
                self, exponent
            )));
        }
        let result = self.to_f64().powf(exponent.to_f64());
        Self::try_from(result)
    }

    /// Round to `places` fractional digits
    pub fn round_dp(&self, places: u32, mode: RoundingMode) -> Self {
        if places >= SCALE {
            return self.clone();
        }
        let step = pow10(SCALE - places);
        Self::from_units(div_round(&self.units, &step, mode) * step)
    }

    /// Nearest `f64` (may lose precision)
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }

    /// The value as `i64`, when it is integral and in range
    pub fn to_i64(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }
        (&self.units / &*ONE_UNITS).to_i64()
    }
}

impl fmt::Display for ScaledDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.units.abs().to_string();
        let scale = SCALE as usize;
        let (int_part, frac_part) = if digits.len() > scale {
            let split = digits.len() - scale;
            (digits[..split].to_string(), digits[split..].to_string())
        } else {
            ("0".to_string(), format!("{:0>width$}", digits, width = scale))
        };
        let frac_part = frac_part.trim_end_matches('0');

        if self.units.is_negative() {
            f.write_str("-")?;
        }
        f.write_str(&int_part)?;
        if !frac_part.is_empty() {
            write!(f, ".{}", frac_part)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ScaledDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScaledDecimal({})", self)
    }
}

impl FromStr for ScaledDecimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<i64> for ScaledDecimal {
    fn from(value: i64) -> Self {
        Self::from_units(BigInt::from(value) * &*ONE_UNITS)
    }
}

impl From<i32> for ScaledDecimal {
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}

impl From<u32> for ScaledDecimal {
    fn from(value: u32) -> Self {
        Self::from(i64::from(value))
    }
}

impl From<u64> for ScaledDecimal {
    fn from(value: u64) -> Self {
        Self::from_units(BigInt::from(value) * &*ONE_UNITS)
    }
}

impl From<rust_decimal::Decimal> for ScaledDecimal {
    fn from(value: rust_decimal::Decimal) -> Self {
        let mantissa = BigInt::from(value.mantissa());
        let scale = value.scale();
        if scale <= SCALE {
            Self::from_units(mantissa * pow10(SCALE - scale))
        } else {
            Self::from_units(div_round(
                &mantissa,
                &pow10(scale - SCALE),
                RoundingMode::HalfEven,
            ))
        }
    }
}

impl TryFrom<f64> for ScaledDecimal {
    type Error = DecimalError;

    /// Converts through the shortest text that round-trips the float,
    /// so `0.1_f64` becomes exactly `0.1`.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(DecimalError::NonFinite);
        }
        Self::parse(&value.to_string())
    }
}

impl ops::Add for &ScaledDecimal {
    type Output = ScaledDecimal;

    fn add(self, rhs: Self) -> ScaledDecimal {
        ScaledDecimal::add(self, rhs)
    }
}

impl ops::Add for ScaledDecimal {
    type Output = ScaledDecimal;

    fn add(self, rhs: Self) -> ScaledDecimal {
        ScaledDecimal::add(&self, &rhs)
    }
}

impl ops::Sub for &ScaledDecimal {
    type Output = ScaledDecimal;

    fn sub(self, rhs: Self) -> ScaledDecimal {
        ScaledDecimal::sub(self, rhs)
    }
}

impl ops::Sub for ScaledDecimal {
    type Output = ScaledDecimal;

    fn sub(self, rhs: Self) -> ScaledDecimal {
        ScaledDecimal::sub(&self, &rhs)
    }
}

impl ops::Mul for &ScaledDecimal {
    type Output = ScaledDecimal;

    fn mul(self, rhs: Self) -> ScaledDecimal {
        ScaledDecimal::mul(self, rhs)
    }
}

impl ops::Mul for ScaledDecimal {
    type Output = ScaledDecimal;

    fn mul(self, rhs: Self) -> ScaledDecimal {
        ScaledDecimal::mul(&self, &rhs)
    }
}

impl ops::Neg for ScaledDecimal {
    type Output = ScaledDecimal;

    fn neg(self) -> ScaledDecimal {
        ScaledDecimal::from_units(-self.units)
    }
}

impl ops::Neg for &ScaledDecimal {
    type Output = ScaledDecimal;

    fn neg(self) -> ScaledDecimal {
        ScaledDecimal::neg(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> ScaledDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        assert_eq!(d("1.50").to_string(), "1.5");
        assert_eq!(d("1005.000").to_string(), "1005");
        assert_eq!(d("-0.25").to_string(), "-0.25");
        assert_eq!(d("0").to_string(), "0");
        assert_eq!(d("0.00000000000000000001").to_string(), "0.00000000000000000001");
    }

    #[test]
    fn test_textual_precision_does_not_change_value() {
        assert_eq!(d("1.5"), d("1.500000"));
        assert!(d("2.10") > d("2.09999"));
        assert_eq!(d("1e3"), d("1000"));
    }

    #[test]
    fn test_exact_multiplication() {
        assert_eq!(d("1.005").mul(&d("1000")), d("1005"));
        assert_eq!((&d("0.1") + &d("0.2")), d("0.3"));
    }

    #[test]
    fn test_division_rounds_half_even() {
        assert_eq!(
            d("1").checked_div(&d("3")).unwrap().to_string(),
            "0.33333333333333333333"
        );
        assert_eq!(
            d("2").checked_div(&d("3")).unwrap().to_string(),
            "0.66666666666666666667"
        );
        assert_eq!(
            d("-2").checked_div(&d("3")).unwrap().to_string(),
            "-0.66666666666666666667"
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(d("1").checked_div(&d("0")), Err(DecimalError::DivideByZero));
        assert_eq!(d("1").rem(&d("0.000")), Err(DecimalError::DivideByZero));
    }

    #[test]
    fn test_remainder_takes_dividend_sign() {
        assert_eq!(d("7").rem(&d("3")).unwrap(), d("1"));
        assert_eq!(d("-7").rem(&d("3")).unwrap(), d("-1"));
        assert_eq!(d("7.5").rem(&d("2")).unwrap(), d("1.5"));
    }

    #[test]
    fn test_integral_powers() {
        assert_eq!(d("2").pow(&d("10")).unwrap(), d("1024"));
        assert_eq!(d("1.1").pow(&d("2")).unwrap(), d("1.21"));
        assert_eq!(d("2").pow(&d("-2")).unwrap(), d("0.25"));
        assert_eq!(d("5").pow(&d("0")).unwrap(), ScaledDecimal::one());
        assert_eq!(d("0").pow(&d("-1")), Err(DecimalError::DivideByZero));
        assert!(matches!(
            d("2").pow(&d("100000")),
            Err(DecimalError::ExponentOutOfRange(_))
        ));
        assert!(matches!(
            d("1e1000").pow(&d("5000")),
            Err(DecimalError::ExponentOutOfRange(_))
        ));
    }

    #[test]
    fn test_fractional_powers() {
        assert_eq!(d("9").pow(&d("0.5")).unwrap(), d("3"));
        assert!(matches!(
            d("-9").pow(&d("0.5")),
            Err(DecimalError::Unsupported(_))
        ));
    }

    #[test]
    fn test_round_dp() {
        assert_eq!(d("2.345").round_dp(2, RoundingMode::HalfEven), d("2.34"));
        assert_eq!(d("2.345").round_dp(2, RoundingMode::HalfUp), d("2.35"));
        assert_eq!(d("-2.5").round_dp(0, RoundingMode::HalfUp), d("-3"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(ScaledDecimal::try_from(0.1_f64).unwrap(), d("0.1"));
        assert_eq!(ScaledDecimal::try_from(f64::NAN), Err(DecimalError::NonFinite));
        assert_eq!(ScaledDecimal::from(rust_decimal::Decimal::new(12345, 2)), d("123.45"));
        assert_eq!(d("42").to_i64(), Some(42));
        assert_eq!(d("42.5").to_i64(), None);
        assert_eq!(d("-2.5").to_f64(), -2.5);
        assert_eq!(d("-0.001").signum(), d("-1"));
    }
}
