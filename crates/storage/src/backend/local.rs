//! Local filesystem storage backend.
//!
//! Objects are stored as plain files under a configured directory and
//! accessed using `tokio::fs`. Object metadata lives in a JSON sidecar under
//! `.meta/` so that the image files themselves stay untouched.

use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use crate::{ObjectInfo, ObjectMeta, StorageBackend};
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;

const META_DIR: &str = ".meta";

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use folio_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/var/lib/folio/covers")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory for stored objects
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and isn't a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Validate a key and map it to its data file and metadata sidecar.
    fn paths(&self, key: &str) -> Result<(String, PathBuf, PathBuf)> {
        let key = validate_key(key)?;
        if key == META_DIR || key.starts_with(&format!("{META_DIR}/")) {
            exn::bail!(ErrorKind::InvalidKey(key));
        }
        let data = self.root.join(&key);
        let meta = self.root.join(META_DIR).join(format!("{key}.json"));
        Ok((key, data, meta))
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn write_file(path: &Path, data: &[u8], key: &str) -> Result<()> {
        // Create parent directories if needed, to keep behaviour
        // consistent with S3-compatible storage.
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, key))?;
        }
        Ok(fs::write(path, data).await.map_err(|e| Self::map_io_error(e, key))?)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        let (key, data_path, meta_path) = self.paths(key)?;
        let metadata = match fs::metadata(&data_path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => exn::bail!(Self::map_io_error(e, &key)),
        };
        let meta = match fs::read(&meta_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                tracing::warn!(backend = %self.name, key = %key, error = %err, "Ignoring unreadable object metadata");
                ObjectMeta::default()
            }),
            Err(_) => ObjectMeta::default(),
        };
        let mut info = ObjectInfo::new(key, metadata.len(), meta);
        if let Ok(modified) = metadata.modified() {
            info = info.with_modified(OffsetDateTime::from(modified));
        }
        Ok(Some(info))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let (key, data_path, _) = self.paths(key)?;
        Ok(fs::read(&data_path).await.map_err(|e| Self::map_io_error(e, &key))?)
    }

    async fn put(&self, key: &str, data: &[u8], meta: &ObjectMeta) -> Result<()> {
        let (key, data_path, meta_path) = self.paths(key)?;
        let meta_json =
            serde_json::to_vec(meta).or_raise(|| ErrorKind::BackendError(format!("could not encode metadata for {key}")))?;
        Self::write_file(&data_path, data, &key).await?;
        Self::write_file(&meta_path, &meta_json, &key).await?;
        tracing::debug!(backend = %self.name, key = %key, bytes = data.len(), "Stored object");
        Ok(())
    }
}
