//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, a small put/head/get
//! interface over object storage that is implemented for the local
//! filesystem, S3-compatible services, and an in-memory store for tests.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod ro;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::{ObjectInfo, ObjectMeta};
use async_trait::async_trait;

/// Unified interface for object storage backends.
///
/// # Key Handling
/// All keys are relative to the backend root and are validated using
/// [`validate_key`](crate::validate_key) before use. Implementations enforce
/// this validation.
///
/// # Examples
///
/// ```
/// use folio_storage::{ObjectMeta, StorageBackend, error::Result};
///
/// async fn store_once(backend: &dyn StorageBackend, key: &str, data: &[u8]) -> Result<bool> {
///     if backend.exists(key).await? {
///         return Ok(false);
///     }
///     backend.put(key, data, &ObjectMeta::new("image/jpeg")).await?;
///     Ok(true)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// Fetch object metadata without the body.
    ///
    /// Returns `Ok(None)` when the object does not exist.
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.head(key).await?.is_some())
    }

    /// Read the whole object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Create or overwrite an object.
    async fn put(&self, key: &str, data: &[u8], meta: &ObjectMeta) -> Result<()>;
}
