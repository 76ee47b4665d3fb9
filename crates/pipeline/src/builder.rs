use crate::cache::CoverCache;
use crate::error::{ErrorKind, Result};
use crate::existence::ExistenceCache;
use crate::notify::Notifier;
use crate::process::{DefaultProcessor, ImageProcessor};
use crate::resolve::{BackgroundPool, CoverResolver, Inner};
use crate::upload::{HostResolver, OriginPolicy, SystemResolver, UploadLimits, Uploader};
use exn::ResultExt;
use folio_catalog::{CoverStore, Database, Repository};
use folio_config::{BackendConfig, Configuration};
use folio_cover::{CoverSource, SelectionPolicy};
use folio_fetch::{FetcherHandle, HttpClient, KnownBad, ObjectStoreFetcher, ReqwestClient, providers};
use folio_storage::BackendHandle;
use folio_storage::backend::{LocalBackend, ReadOnlyBackend};
use std::sync::Arc;

const KNOWN_BAD_CAPACITY: u64 = 100_000;

/// Assembles a [`CoverResolver`] from a [`Configuration`].
///
/// Anything not supplied explicitly is derived from the configuration: the
/// storage backend, a reqwest HTTP client, the `image` based processor, the
/// system DNS resolver and the configured providers.
pub struct PipelineBuilder {
    config: Configuration,
    backend: Option<BackendHandle>,
    http: Option<Arc<dyn HttpClient>>,
    processor: Option<Arc<dyn ImageProcessor>>,
    resolver: Option<Arc<dyn HostResolver>>,
    catalog: Option<Arc<dyn CoverStore>>,
    providers: Option<Vec<FetcherHandle>>,
    notifier: Option<Notifier>,
}
impl PipelineBuilder {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            backend: None,
            http: None,
            processor: None,
            resolver: None,
            catalog: None,
            providers: None,
            notifier: None,
        }
    }

    pub fn with_backend(mut self, backend: BackendHandle) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn ImageProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn with_host_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CoverStore>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Persist canonical covers to `database`. Writes are dry-run when
    /// storage writes are disabled.
    pub fn with_database(self, database: &Database) -> Self {
        let repository = Repository::new(database.pool().clone(), self.config.storage.write_disabled);
        self.with_catalog(Arc::new(repository))
    }

    /// Replace the configured external providers.
    pub fn with_providers(mut self, providers: Vec<FetcherHandle>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<CoverResolver> {
        let config = self.config;
        config.validate().or_raise(|| ErrorKind::Config)?;

        let backend = match self.backend {
            Some(backend) => backend,
            None => backend_from_config(&config.storage.backend)?,
        };
        let backend: BackendHandle = if config.storage.write_disabled {
            tracing::info!(backend = backend.name(), "Storage writes disabled");
            Arc::new(ReadOnlyBackend::new(backend))
        } else {
            backend
        };
        let http: Arc<dyn HttpClient> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestClient::new().or_raise(|| ErrorKind::Http)?),
        };
        let processor = self.processor.unwrap_or_else(|| Arc::new(DefaultProcessor::new(config.upload.max_edge_px)));
        let resolver = self.resolver.unwrap_or_else(|| Arc::new(SystemResolver));

        let known_bad = KnownBad::new(config.cache.known_bad_ttl(), KNOWN_BAD_CAPACITY);
        let providers = match self.providers {
            Some(providers) => providers,
            None => providers::configured(&config.providers, http.clone(), &known_bad),
        };
        let url_base = config.storage.public_base();
        if url_base.is_none() {
            tracing::warn!("No public URL base configured, stored covers cannot be served");
        }
        let sources = config.selection.provider_ranking.iter().map(|name| CoverSource::from(name.clone())).collect();
        let store = Arc::new(ObjectStoreFetcher::new(
            backend.clone(),
            url_base.clone(),
            sources,
            config.storage.fetch_head_timeout(),
        ));
        let existence = ExistenceCache::new(config.cache.existence_ttl(), config.cache.existence_capacity);
        let uploader = Uploader::new(
            http,
            processor,
            OriginPolicy::new(&config.upload.allowed_hosts, resolver),
            backend,
            existence,
            url_base,
            UploadLimits::from(&config.upload),
            config.storage.write_disabled,
        );

        tracing::debug!(providers = providers.len(), cache = config.cache.enabled, "Cover pipeline ready");
        Ok(CoverResolver::from_inner(Inner {
            cache: CoverCache::new(&config.cache),
            cache_enabled: config.cache.enabled,
            policy: SelectionPolicy::new(&config.selection),
            high_resolution_pixels: config.selection.high_resolution_pixels,
            providers,
            store,
            fast_head_timeout: config.storage.fast_head_timeout(),
            uploader,
            catalog: self.catalog,
            notifier: self.notifier.unwrap_or_default(),
            pool: BackgroundPool::new(config.background.max_concurrent, config.background.max_queued),
        }))
    }
}

fn backend_from_config(config: &BackendConfig) -> Result<BackendHandle> {
    match config {
        BackendConfig::None => exn::bail!(ErrorKind::MissingBackend),
        BackendConfig::Local { root } => {
            Ok(Arc::new(LocalBackend::new("local", root).or_raise(|| ErrorKind::Storage)?))
        },
        #[cfg(feature = "s3")]
        BackendConfig::S3 {
            bucket,
            prefix,
            region,
            endpoint,
            key_id,
            key_secret,
        } => {
            let backend = folio_storage::backend::S3Backend::new(
                "s3",
                bucket,
                prefix.clone(),
                region,
                endpoint.as_deref(),
                key_id,
                key_secret,
            )
            .or_raise(|| ErrorKind::Storage)?;
            Ok(Arc::new(backend))
        },
        #[cfg(not(feature = "s3"))]
        BackendConfig::S3 { .. } => exn::bail!(ErrorKind::UnsupportedBackend("s3")),
    }
}
