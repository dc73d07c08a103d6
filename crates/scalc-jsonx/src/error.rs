//! Error types for scalc-jsonx

use thiserror::Error;

/// Result type alias using [`JsonxError`]
pub type JsonxResult<T> = std::result::Result<T, JsonxError>;

/// Errors surfaced when normalized text is parsed as strict JSON
///
/// The normalizer itself never fails: malformed relaxed input (an
/// unterminated string, unbalanced brackets) comes out as text that
/// strict JSON rejects.
#[derive(Debug, Error)]
pub enum JsonxError {
    #[error("Invalid JSON after normalization: {0}")]
    Parse(#[from] serde_json::Error),
}
