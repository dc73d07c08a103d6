//! # scalc-jsonx
//!
//! Normalizer for the relaxed, JSON5-like literal syntax that formulas may
//! embed (`{a: 1, b: [x, 'y'],}`).
//!
//! - [`normalize`] - relaxed text to strict JSON text
//! - [`wrap_function_like_values`] - optional pre-pass that keeps `name(...)`
//!   values whole
//! - [`parse_relaxed`] - normalize, then parse with `serde_json`
//! - [`is_date_like`] - the bare date/timestamp grammar
//!
//! Bare numbers come out as JSON *strings* so that callers can apply exact
//! decimal semantics instead of `f64`.
//!
//! ## Example
//!
//! ```rust
//! use scalc_jsonx::parse_relaxed;
//!
//! let value = parse_relaxed("{price: 1.005, tags: [a, 'b'],}", "", false).unwrap();
//! assert_eq!(value["price"], "1.005");
//! assert_eq!(value["tags"][0], "a");
//! ```

pub mod date;
pub mod error;
pub mod normalize;
mod tables;
pub mod wrap;

pub use date::is_date_like;
pub use error::{JsonxError, JsonxResult};
pub use normalize::{json_escape, normalize};
pub use wrap::wrap_function_like_values;

/// Normalize relaxed text and parse the result as strict JSON
///
/// Object key order is preserved.
pub fn parse_relaxed(
    text: &str,
    marker: &str,
    wrap_function_calls: bool,
) -> JsonxResult<serde_json::Value> {
    let strict = normalize(text, marker, wrap_function_calls);
    Ok(serde_json::from_str(&strict)?)
}
