//! Date and timestamp recognition

use lazy_regex::regex_is_match;

/// Check whether `text` is a bare calendar date or timestamp
///
/// Accepts `YYYY` followed by two `-`, `.` or `/` separated one- or
/// two-digit groups, optionally followed by `THH:MM`, seconds, up to nine
/// fractional second digits and a `Z` or `+HH:MM` offset.
///
/// # Example
/// ```rust
/// use scalc_jsonx::is_date_like;
///
/// assert!(is_date_like("2025-8-1"));
/// assert!(is_date_like("2025-08-01T10:30:00.125+02:00"));
/// assert!(!is_date_like("2025-8"));
/// ```
pub fn is_date_like(text: &str) -> bool {
    regex_is_match!(
        r"^\d{4}(?:[-/.]\d{1,2}){2}(?:T\d{2}:\d{2}(?::\d{2}(?:\.\d{1,9})?)?(?:[Zz]|[+-]\d{2}:?\d{2})?)?$",
        text
    )
}
