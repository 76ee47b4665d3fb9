//! Error types for the [`upload`](super) module.
//!
//! Each variant names the pipeline step that failed. The caller decides how
//! to fall back; none of these escape a background resolution.

use derive_more::{Display, Error};

/// An upload error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upload operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The URL failed origin validation; nothing was downloaded.
    #[display("origin rejected: {_0}")]
    OriginRejected(#[error(not(source))] String),
    /// The image could not be downloaded.
    #[display("download failed: {_0}")]
    DownloadFailed(#[error(not(source))] String),
    /// A local cover file could not be read.
    #[display("could not read local cover: {_0}")]
    LocalReadFailed(#[error(not(source))] String),
    /// The bytes could not be turned into a storable image.
    #[display("image processing failed")]
    ProcessingFailed,
    /// The processed image is still too large to store.
    #[display("processed image is {size} bytes, limit is {limit}")]
    SizeExceeded { size: u64, limit: u64 },
    /// The object store rejected the write.
    #[display("upload to object store failed")]
    UploadFailed,
    /// No public CDN, CDN or endpoint/bucket base is configured.
    #[display("no public URL base configured")]
    UrlBaseUnresolved,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DownloadFailed(_) | Self::UploadFailed)
    }
}
