//! Configuration for the folio cover pipeline.
//!
//! Values are layered with [`figment`]: compiled-in defaults first, then an
//! optional configuration file (YAML, TOML or JSON, picked by extension), then
//! `FOLIO_`-prefixed environment variables. Nested keys in the environment use
//! a double underscore, e.g. `FOLIO_STORAGE__WRITE_DISABLED=true`.
//!
//! ```
//! use folio_config::Configuration;
//!
//! let config = Configuration::default();
//! assert!(config.cache.enabled);
//! assert!(config.validate().is_ok());
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

const ENV_PREFIX: &str = "FOLIO_";
const DEFAULT_CONFIG_FILENAME: &str = "config.yaml";

/// Provider names as they appear in configuration and storage keys.
pub const GOOGLE_BOOKS: &str = "google-books";
pub const OPEN_LIBRARY: &str = "open-library";
pub const LONGITOOD: &str = "longitood";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub cache: CacheConfig,
    pub selection: SelectionConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub providers: ProvidersConfig,
    pub background: BackgroundConfig,
}
impl Default for Configuration {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            selection: SelectionConfig::default(),
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            providers: default_providers(),
            background: BackgroundConfig::default(),
        }
    }
}

/// Lifetimes and capacities of the in-process caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch; when off, nothing is cached and no background work runs.
    pub enabled: bool,
    pub final_ttl_secs: u64,
    pub final_capacity: u64,
    pub provisional_ttl_secs: u64,
    pub provisional_capacity: u64,
    /// How long a durable-store existence check result is trusted.
    pub existence_ttl_secs: u64,
    pub existence_capacity: u64,
    /// How long an identifier that failed at a provider is skipped for.
    pub known_bad_ttl_secs: u64,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            final_ttl_secs: 6 * 60 * 60,
            final_capacity: 10_000,
            provisional_ttl_secs: 5 * 60,
            provisional_capacity: 10_000,
            existence_ttl_secs: 10 * 60,
            existence_capacity: 50_000,
            known_bad_ttl_secs: 60 * 60,
        }
    }
}
impl CacheConfig {
    pub fn final_ttl(&self) -> Duration {
        Duration::from_secs(self.final_ttl_secs)
    }

    pub fn provisional_ttl(&self) -> Duration {
        Duration::from_secs(self.provisional_ttl_secs)
    }

    pub fn existence_ttl(&self) -> Duration {
        Duration::from_secs(self.existence_ttl_secs)
    }

    pub fn known_bad_ttl(&self) -> Duration {
        Duration::from_secs(self.known_bad_ttl_secs)
    }
}

/// Candidate selection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub min_width: u32,
    pub min_height: u32,
    /// Pixel count at or above which a cover is flagged as high resolution.
    pub high_resolution_pixels: u64,
    /// Path served when nothing better is known.
    pub placeholder: String,
    /// Known providers, best first. Unlisted providers rank after all of these.
    pub provider_ranking: Vec<String>,
}
impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_width: 100,
            min_height: 150,
            high_resolution_pixels: 320_000,
            placeholder: "/images/placeholder-book-cover.svg".to_string(),
            provider_ranking: vec![GOOGLE_BOOKS.to_string(), OPEN_LIBRARY.to_string(), LONGITOOD.to_string()],
        }
    }
}

/// Durable object storage and public URL resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendConfig,
    /// Preferred base for public URLs.
    pub public_cdn_base: Option<String>,
    /// Fallback base for public URLs.
    pub cdn_base: Option<String>,
    /// Turns every object-store write (and catalog write) into a logged no-op.
    pub write_disabled: bool,
    /// Budget for the existence check on the request path.
    pub fast_head_timeout_ms: u64,
    /// Budget for the existence checks run by the background fetcher.
    pub fetch_head_timeout_ms: u64,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            public_cdn_base: None,
            cdn_base: None,
            write_disabled: false,
            fast_head_timeout_ms: 300,
            fetch_head_timeout_ms: 1500,
        }
    }
}
impl StorageConfig {
    pub fn fast_head_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_head_timeout_ms)
    }

    pub fn fetch_head_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_head_timeout_ms)
    }

    /// Base URL that keys are appended to, in order of preference: public CDN,
    /// CDN, then `endpoint/bucket` for S3-compatible backends.
    pub fn public_base(&self) -> Option<String> {
        let base = self
            .public_cdn_base
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .or_else(|| self.cdn_base.as_deref().filter(|b| !b.trim().is_empty()))
            .map(|b| b.trim().trim_end_matches('/').to_string());
        if base.is_some() {
            return base;
        }
        match &self.backend {
            BackendConfig::S3 { endpoint: Some(endpoint), bucket, .. } if !endpoint.trim().is_empty() => {
                Some(format!("{}/{}", endpoint.trim().trim_end_matches('/'), bucket))
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// No backend configured; one must be supplied programmatically.
    #[default]
    None,
    /// Directory on the local filesystem.
    Local { root: PathBuf },
    /// S3-compatible bucket (AWS, Backblaze B2, MinIO, DigitalOcean Spaces).
    S3 {
        bucket: String,
        prefix: Option<String>,
        region: String,
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
    },
}

/// Remote image download, validation and processing limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Hosts images may be downloaded from. Entries starting with `*.` match
    /// any subdomain.
    pub allowed_hosts: Vec<String>,
    pub download_timeout_ms: u64,
    /// Upper bound on bytes read from a remote image before giving up.
    pub max_download_bytes: u64,
    /// Upper bound on the processed image that will be stored.
    pub max_stored_bytes: u64,
    /// Longest edge processed images are scaled down to.
    pub max_edge_px: u32,
}
impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec![
                "books.google.com".to_string(),
                "*.googleusercontent.com".to_string(),
                "covers.openlibrary.org".to_string(),
                "*.archive.org".to_string(),
                "m.media-amazon.com".to_string(),
                "images-na.ssl-images-amazon.com".to_string(),
            ],
            download_timeout_ms: 5_000,
            max_download_bytes: 15 * 1024 * 1024,
            max_stored_bytes: 5 * 1024 * 1024,
            max_edge_px: 1_600,
        }
    }
}
impl UploadConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }
}

/// Per-provider request policy, keyed by provider name.
pub type ProvidersConfig = BTreeMap<String, ProviderConfig>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    /// Override the provider's public API base URL (mirrors, tests).
    pub base_url: Option<String>,
    pub requests_per_second: u32,
    pub burst: u32,
    pub timeout_ms: u64,
    /// Wrap the provider in a circuit breaker.
    pub circuit_breaker: bool,
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long the breaker stays open before letting a trial call through.
    pub break_secs: u64,
}
impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            requests_per_second: 2,
            burst: 2,
            timeout_ms: 3_000,
            circuit_breaker: false,
            failure_threshold: 5,
            break_secs: 30,
        }
    }
}
impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_secs(self.break_secs)
    }
}

fn default_providers() -> ProvidersConfig {
    let mut providers = BTreeMap::new();
    providers.insert(
        GOOGLE_BOOKS.to_string(),
        ProviderConfig {
            requests_per_second: 5,
            burst: 5,
            ..ProviderConfig::default()
        },
    );
    providers.insert(
        OPEN_LIBRARY.to_string(),
        ProviderConfig {
            circuit_breaker: true,
            ..ProviderConfig::default()
        },
    );
    providers.insert(
        LONGITOOD.to_string(),
        ProviderConfig {
            requests_per_second: 1,
            burst: 1,
            timeout_ms: 2_500,
            circuit_breaker: true,
            ..ProviderConfig::default()
        },
    );
    providers
}

/// Sizing of the background resolution pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub max_concurrent: usize,
    /// Resolutions waiting for a worker beyond this are dropped.
    pub max_queued: usize,
}
impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_queued: 256,
        }
    }
}

impl Configuration {
    /// Platform-specific default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "folio").map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILENAME))
    }

    /// Load configuration from defaults, an optional file, and the environment.
    ///
    /// When `path` is `None` the [default path](Self::default_path) is used if
    /// it exists. An explicitly given path that does not exist is an error.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        let file = match path {
            Some(p) if !p.exists() => exn::bail!(ErrorKind::NotFound(p.to_path_buf())),
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            figment = match file.extension().and_then(|e| e.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(&file)),
                Some("toml") => figment.merge(Toml::file(&file)),
                Some("json") => figment.merge(Json::file(&file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file)),
            };
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline misbehave silently.
    pub fn validate(&self) -> Result<()> {
        let cache = &self.cache;
        if cache.enabled {
            for (field, value) in [
                ("cache.final_ttl_secs", cache.final_ttl_secs),
                ("cache.final_capacity", cache.final_capacity),
                ("cache.provisional_ttl_secs", cache.provisional_ttl_secs),
                ("cache.provisional_capacity", cache.provisional_capacity),
                ("cache.existence_ttl_secs", cache.existence_ttl_secs),
            ] {
                if value == 0 {
                    exn::bail!(ErrorKind::Invalid(field));
                }
            }
            if cache.provisional_ttl_secs > cache.final_ttl_secs {
                exn::bail!(ErrorKind::Invalid("cache.provisional_ttl_secs"));
            }
        }
        if self.selection.min_width == 0 || self.selection.min_height == 0 {
            exn::bail!(ErrorKind::Invalid("selection.min_width/min_height"));
        }
        if self.selection.placeholder.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("selection.placeholder"));
        }
        if self.storage.fast_head_timeout_ms == 0 || self.storage.fetch_head_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid("storage.*_head_timeout_ms"));
        }
        if !self.storage.write_disabled && self.upload.allowed_hosts.is_empty() {
            exn::bail!(ErrorKind::Invalid("upload.allowed_hosts"));
        }
        if self.upload.max_stored_bytes == 0 || self.upload.max_download_bytes == 0 || self.upload.max_edge_px == 0 {
            exn::bail!(ErrorKind::Invalid("upload limits"));
        }
        for provider in self.providers.values().filter(|p| p.enabled) {
            if provider.requests_per_second == 0 || provider.burst == 0 || provider.timeout_ms == 0 {
                exn::bail!(ErrorKind::Invalid("providers.*"));
            }
        }
        if self.background.max_concurrent == 0 {
            exn::bail!(ErrorKind::Invalid("background.max_concurrent"));
        }
        Ok(())
    }
}
