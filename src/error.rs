// ============================================================================
// spark-tracked - Errors
// Failures of the value-level operations (URL parsing, date arithmetic,
// vector indexing)
// ============================================================================
//
// Graph-level misuse (a derived reading itself, an update loop) is a bug in
// the calling code and panics instead.
// ============================================================================

use thiserror::Error;

/// Errors returned by the reactive built-ins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The string could not be parsed as a URL (or a base-relative one).
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Date components do not name a representable calendar date.
    #[error("invalid date")]
    InvalidDate,

    /// Epoch milliseconds outside the supported range.
    #[error("timestamp {0}ms is outside the supported range")]
    InvalidTimestamp(i64),

    /// A strftime-style pattern with an unknown or malformed specifier.
    #[error("invalid format pattern: {0:?}")]
    InvalidFormat(String),

    /// A reactive vector was indexed past its end.
    #[error("index {index} is out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
