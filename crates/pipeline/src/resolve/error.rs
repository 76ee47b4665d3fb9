//! Error types for the [`resolve`](super) module.
//!
//! None of these reach callers of [`CoverResolver::resolve`](super::CoverResolver::resolve);
//! they are logged and the caller gets a fallback cover.

use derive_more::{Display, Error};

/// A resolve error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for resolve operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The book has nothing a cache key can be derived from.
    #[display("book has no usable identifier")]
    NoIdentifier,
    /// Every source was tried and none produced a usable cover.
    #[display("all cover sources exhausted")]
    AllSourcesExhausted,
    /// The selected cover could not be moved into durable storage.
    #[display("durable upload failed")]
    Upload,
    /// The canonical cover record could not be written.
    #[display("could not persist canonical cover")]
    PersistenceFailed,
    /// The background task panicked.
    #[display("background resolution panicked: {_0}")]
    Panicked(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upload | Self::PersistenceFailed)
    }
}
