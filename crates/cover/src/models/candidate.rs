use super::CoverSource;
use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Where the bytes behind a candidate currently live.
///
/// Declaration order is the selector's tier order: local copies beat durable
/// ones, which beat anything only reachable at an external provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    Local,
    Durable,
    /// Only reachable at the provider.
    None,
}
impl StorageLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Durable => "durable",
            Self::None => "none",
        }
    }
}
impl FromStr for StorageLocation {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "local" => Self::Local,
            "durable" | "s3" => Self::Durable,
            "none" | "external" | "" => Self::None,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "storage_location",
                value: s.to_string(),
            }),
        })
    }
}
impl Display for StorageLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// One possible cover for a book, as reported by a single source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverCandidate {
    /// Public URL, or a local path for [`StorageLocation::Local`].
    pub url: String,
    pub source: CoverSource,
    /// The provider's own identifier for the record this came from.
    pub source_system_id: Option<String>,
    pub location: StorageLocation,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub high_resolution: Option<bool>,
    /// Object-store key, for durable candidates.
    pub storage_key: Option<String>,
}
impl CoverCandidate {
    pub fn new(url: impl Into<String>, source: CoverSource, location: StorageLocation) -> Self {
        Self {
            url: url.into(),
            source,
            source_system_id: None,
            location,
            width: None,
            height: None,
            high_resolution: None,
            storage_key: None,
        }
    }

    /// A candidate only reachable at its provider.
    pub fn external(url: impl Into<String>, source: CoverSource) -> Self {
        Self::new(url, source, StorageLocation::None)
    }

    /// A candidate already in durable object storage under `key`.
    pub fn durable(url: impl Into<String>, source: CoverSource, key: impl Into<String>) -> Self {
        Self {
            storage_key: Some(key.into()),
            ..Self::new(url, source, StorageLocation::Durable)
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_source_system_id(mut self, id: impl Into<String>) -> Self {
        self.source_system_id = Some(id.into());
        self
    }

    pub fn with_high_resolution(mut self, high_resolution: bool) -> Self {
        self.high_resolution = Some(high_resolution);
        self
    }

    /// Pixel count, or zero when either dimension is unknown.
    pub fn pixels(&self) -> u64 {
        match (self.width, self.height) {
            (Some(w), Some(h)) => u64::from(w) * u64::from(h),
            _ => 0,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.location == StorageLocation::Durable
    }
}
