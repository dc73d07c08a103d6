//! Decimal number grammar and text parsing
//!
//! The grammar accepted everywhere in scalc ("pure decimal"):
//! an optional `+`/`-` sign, digits with optional `_` group separators,
//! at most one `.`, and an optional `e`/`E` exponent with its own sign.
//! At least one mantissa digit is required. Hex, octal, `NaN` and
//! `Infinity` are not numbers.

use crate::error::{DecimalError, DecimalResult};
use crate::rounding::{div_round, pow10, RoundingMode};
use crate::SCALE;
use num_bigint::BigInt;

/// Largest accepted exponent magnitude in scientific notation
pub const MAX_EXPONENT: i64 = 1_000_000;

/// Check whether `token` is a pure decimal number
///
/// # Example
/// ```rust
/// use scalc_decimal::is_decimal_literal;
///
/// assert!(is_decimal_literal("1_000.50"));
/// assert!(is_decimal_literal("-.5e-3"));
/// assert!(!is_decimal_literal("0x10"));
/// assert!(!is_decimal_literal("2025-8-1"));
/// ```
pub fn is_decimal_literal(token: &str) -> bool {
    let bytes = token.as_bytes();
    let len = bytes.len();
    let mut j = 0;

    if len == 0 {
        return false;
    }
    if bytes[0] == b'+' || bytes[0] == b'-' {
        if len == 1 {
            return false;
        }
        j = 1;
    }
    if !bytes[j].is_ascii_digit() && bytes[j] != b'.' {
        return false;
    }

    let mut saw_digit = false;
    let mut saw_dot = false;
    let mut saw_exponent = false;

    while j < len {
        let c = bytes[j];
        if c.is_ascii_digit() {
            saw_digit = true;
            j += 1;
        } else if c == b'_' {
            j += 1;
        } else if c == b'.' && !saw_dot && !saw_exponent {
            saw_dot = true;
            j += 1;
        } else if (c == b'e' || c == b'E') && !saw_exponent && saw_digit {
            saw_exponent = true;
            j += 1;
            if j < len && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            let mut exponent_digits = false;
            while j < len {
                if bytes[j].is_ascii_digit() {
                    exponent_digits = true;
                } else if bytes[j] != b'_' {
                    break;
                }
                j += 1;
            }
            if !exponent_digits {
                return false;
            }
        } else {
            return false;
        }
    }

    saw_digit
}

/// Parse decimal text into scaled units (`value * 10^SCALE`)
///
/// Digits beyond the scale are rounded half-even.
pub(crate) fn parse_units(text: &str) -> DecimalResult<BigInt> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DecimalError::Empty);
    }
    if !is_decimal_literal(trimmed) {
        return Err(DecimalError::Invalid(trimmed.to_string()));
    }

    let cleaned: String = trimmed.chars().filter(|&c| c != '_').collect();
    let (negative, unsigned) = match cleaned.as_bytes()[0] {
        b'-' => (true, &cleaned[1..]),
        b'+' => (false, &cleaned[1..]),
        _ => (false, cleaned.as_str()),
    };

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => (&unsigned[..pos], parse_exponent(&unsigned[pos + 1..], trimmed)?),
        None => (unsigned, 0),
    };
    let (int_digits, frac_digits) = match mantissa.find('.') {
        Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
        None => (mantissa, ""),
    };

    let mut digits = String::with_capacity(int_digits.len() + frac_digits.len());
    digits.push_str(int_digits);
    digits.push_str(frac_digits);
    let significand = digits
        .parse::<BigInt>()
        .map_err(|_| DecimalError::Invalid(trimmed.to_string()))?;

    let shift = SCALE as i64 - frac_digits.len() as i64 + exponent;
    let magnitude = if shift >= 0 {
        significand * pow10(shift as u32)
    } else {
        let drop = u32::try_from(-shift)
            .map_err(|_| DecimalError::ExponentOutOfRange(trimmed.to_string()))?;
        div_round(&significand, &pow10(drop), RoundingMode::HalfEven)
    };

    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_exponent(text: &str, original: &str) -> DecimalResult<i64> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.len() > 9 {
        return Err(DecimalError::ExponentOutOfRange(original.to_string()));
    }
    let value: i64 = digits
        .parse()
        .map_err(|_| DecimalError::Invalid(original.to_string()))?;
    if value > MAX_EXPONENT {
        return Err(DecimalError::ExponentOutOfRange(original.to_string()));
    }
    Ok(if negative { -value } else { value })
}
