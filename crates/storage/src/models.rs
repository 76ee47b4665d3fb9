//! Storage models.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const META_WIDTH: &str = "width";
const META_HEIGHT: &str = "height";
const META_HASH: &str = "content-hash";
const META_SOURCE: &str = "source";

/// BLAKE3 hash of some bytes, hex encoded.
pub fn content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Metadata stored alongside an object.
///
/// Everything is optional; objects written by older deployments may carry
/// none of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub content_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// BLAKE3 hash of the object body
    pub content_hash: Option<String>,
    /// Name of the source the image came from
    pub source: Option<String>,
}
impl ObjectMeta {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Flatten into string pairs, as object stores keep user metadata.
    /// `content_type` is carried separately by every backend and isn't included.
    pub fn to_user_metadata(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(width) = self.width {
            map.insert(META_WIDTH.to_string(), width.to_string());
        }
        if let Some(height) = self.height {
            map.insert(META_HEIGHT.to_string(), height.to_string());
        }
        if let Some(hash) = &self.content_hash {
            map.insert(META_HASH.to_string(), hash.clone());
        }
        if let Some(source) = &self.source {
            map.insert(META_SOURCE.to_string(), source.clone());
        }
        map
    }

    /// Inverse of [`to_user_metadata`](Self::to_user_metadata). Unparseable
    /// dimensions are dropped rather than failing the whole lookup.
    pub fn from_user_metadata(content_type: Option<String>, map: &HashMap<String, String>) -> Self {
        Self {
            content_type,
            width: map.get(META_WIDTH).and_then(|w| w.parse().ok()),
            height: map.get(META_HEIGHT).and_then(|h| h.parse().ok()),
            content_hash: map.get(META_HASH).cloned(),
            source: map.get(META_SOURCE).cloned(),
        }
    }
}

/// Object metadata returned by `head`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Validated key relative to the backend root
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp, when the backend reports one
    pub modified: Option<OffsetDateTime>,
    pub meta: ObjectMeta,
}
impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64, meta: ObjectMeta) -> Self {
        Self {
            key: key.into(),
            size,
            modified: None,
            meta,
        }
    }

    pub fn with_modified(mut self, modified: OffsetDateTime) -> Self {
        self.modified = Some(modified);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_metadata_round_trip() {
        let meta = ObjectMeta::new("image/jpeg")
            .with_dimensions(400, 600)
            .with_content_hash(content_hash(b"cover"))
            .with_source("google-books");
        let map = meta.to_user_metadata();
        assert_eq!(map.len(), 4);
        assert_eq!(ObjectMeta::from_user_metadata(Some("image/jpeg".to_string()), &map), meta);
    }

    #[test]
    fn test_bad_dimensions_are_dropped() {
        let map = HashMap::from([("width".to_string(), "wide".to_string()), ("height".to_string(), "600".to_string())]);
        let meta = ObjectMeta::from_user_metadata(None, &map);
        assert_eq!(meta.width, None);
        assert_eq!(meta.height, Some(600));
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
        assert_eq!(content_hash(b"").len(), 64);
    }
}
