//! Error types for scalc-decimal

use thiserror::Error;

/// Result type alias using [`DecimalError`]
pub type DecimalResult<T> = std::result::Result<T, DecimalError>;

/// Errors that can occur while parsing or computing scaled decimals
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalError {
    /// Empty input where a number was expected
    #[error("Empty number")]
    Empty,

    /// Text that does not follow the decimal grammar
    #[error("Invalid number: {0}")]
    Invalid(String),

    /// Exponent too large to materialize
    #[error("Exponent out of range: {0}")]
    ExponentOutOfRange(String),

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivideByZero,

    /// NaN or infinite floating point input/output
    #[error("Number is not finite")]
    NonFinite,

    /// Operation has no exact decimal result
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}
