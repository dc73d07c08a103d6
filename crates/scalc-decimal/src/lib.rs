//! # scalc-decimal
//!
//! Exact base-10 fixed-point arithmetic for the scalc formula engine.
//!
//! Every value is an arbitrary-precision integer count of `10^-SCALE` units,
//! so decimal text such as `1.005` is represented exactly and
//! `1.005 * 1000` is `1005`, not `1004.9999999999999`.
//!
//! - [`ScaledDecimal`] - the value type and its operations
//! - [`is_decimal_literal`] - the number grammar shared by the other scalc crates
//! - [`RoundingMode`] - how results that do not fit the scale are rounded
//!
//! ## Example
//!
//! ```rust
//! use scalc_decimal::ScaledDecimal;
//!
//! let a: ScaledDecimal = "1_000.50".parse().unwrap();
//! let b = ScaledDecimal::from(3);
//! assert_eq!(a.checked_div(&b).unwrap().to_string(), "333.5");
//! ```

pub mod decimal;
pub mod error;
pub mod parse;
pub mod rounding;

/// Number of fractional digits carried by every [`ScaledDecimal`]
pub const SCALE: u32 = 20;

// Re-exports for convenience
pub use decimal::{ScaledDecimal, MAX_POW_EXPONENT};
pub use error::{DecimalError, DecimalResult};
pub use parse::{is_decimal_literal, MAX_EXPONENT};
pub use rounding::RoundingMode;
