//! Cover Domain Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A cover domain error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cover domain operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The book carries no ISBN, external identifier or internal id.
    #[display("book has no usable identifier")]
    NoIdentifier,
    /// A value could not be parsed into a domain type.
    #[display("could not parse {field}: {value}")]
    ParseError {
        field: &'static str,
        #[error(not(source))]
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
