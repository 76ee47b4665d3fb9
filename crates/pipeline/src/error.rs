//! Pipeline Error Types
//!
//! Errors raised while assembling a [`CoverResolver`](crate::CoverResolver).
//! Once built, the resolver itself never returns an error to its callers;
//! see [`upload::error`](crate::upload::error) and
//! [`resolve::error`](crate::resolve::error) for what is logged instead.

use derive_more::{Display, Error};

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline construction.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not open storage backend")]
    Storage,
    #[display("could not build HTTP client")]
    Http,
    /// No backend was configured or supplied.
    #[display("no storage backend configured")]
    MissingBackend,
    /// The configured backend needs a feature this build doesn't have.
    #[display("storage backend `{_0}` is not compiled in")]
    UnsupportedBackend(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
