//! Rounding of integer quotients

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use std::cmp::Ordering;

/// How a quotient that falls between two representable values is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    /// Ties go to the neighbour with an even last digit (banker's rounding)
    #[default]
    HalfEven,
    /// Ties go away from zero
    HalfUp,
}

/// `10^exponent` as a big integer
pub(crate) fn pow10(exponent: u32) -> BigInt {
    BigInt::from(10u32).pow(exponent)
}

/// Divide `numerator` by a non-zero `denominator`, rounding to the nearest integer.
///
/// The truncated quotient is moved one step away from zero when the remainder is
/// more than half the divisor, or exactly half and `mode` asks for it.
pub(crate) fn div_round(numerator: &BigInt, denominator: &BigInt, mode: RoundingMode) -> BigInt {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.is_zero() {
        return quotient;
    }

    let negative = numerator.is_negative() != denominator.is_negative();
    let twice = remainder.abs() * 2u32;
    let away = match twice.cmp(&denominator.abs()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match mode {
            RoundingMode::HalfUp => true,
            RoundingMode::HalfEven => !(&quotient % 2u32).is_zero(),
        },
    };

    match (away, negative) {
        (false, _) => quotient,
        (true, false) => quotient + 1u32,
        (true, true) => quotient - 1u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(n: i64, d: i64, mode: RoundingMode) -> i64 {
        let q = div_round(&BigInt::from(n), &BigInt::from(d), mode);
        i64::try_from(q).unwrap()
    }

    #[test]
    fn test_exact_quotient() {
        assert_eq!(round(10, 5, RoundingMode::HalfEven), 2);
        assert_eq!(round(-10, 5, RoundingMode::HalfUp), -2);
    }

    #[test]
    fn test_half_even_ties() {
        assert_eq!(round(5, 2, RoundingMode::HalfEven), 2);
        assert_eq!(round(7, 2, RoundingMode::HalfEven), 4);
        assert_eq!(round(-5, 2, RoundingMode::HalfEven), -2);
        assert_eq!(round(-7, 2, RoundingMode::HalfEven), -4);
    }

    #[test]
    fn test_half_up_ties() {
        assert_eq!(round(5, 2, RoundingMode::HalfUp), 3);
        assert_eq!(round(-5, 2, RoundingMode::HalfUp), -3);
        assert_eq!(round(5, -2, RoundingMode::HalfUp), -3);
    }

    #[test]
    fn test_non_ties_round_to_nearest() {
        assert_eq!(round(2, 3, RoundingMode::HalfEven), 1);
        assert_eq!(round(1, 3, RoundingMode::HalfUp), 0);
        assert_eq!(round(-2, 3, RoundingMode::HalfEven), -1);
    }
}
