//! Durable upload of cover images.
//!
//! Takes either a remote URL or an already processed image and makes sure it
//! exists in the object store under its canonical key, returning the public
//! URL. Remote URLs go through origin validation, a bounded download and the
//! [`ImageProcessor`] first. Identical objects are never written twice.
//!
//! Every step appends an [`Attempt`](folio_cover::Attempt) to the run's
//! [`Provenance`].

pub mod error;
mod origin;

pub use self::origin::{HostResolver, OriginPolicy, SystemResolver};
pub use folio_fetch::net::is_internal;
use self::error::{ErrorKind, Result};
use crate::existence::ExistenceCache;
use crate::process::{ImageProcessor, ProcessedImage};
use exn::ResultExt;
use folio_config::UploadConfig;
use folio_cover::keys::{canonical_key, legacy_keys, public_url};
use folio_cover::{AttemptStatus, CoverSource, Provenance};
use folio_fetch::HttpClient;
use folio_fetch::error::{ErrorKind as FetchErrorKind, FailureClass};
use folio_storage::{BackendHandle, ObjectMeta, content_hash};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Redirect hops followed for a single download.
pub const MAX_REDIRECTS: usize = 5;

/// What to upload.
#[derive(Debug, Clone)]
pub enum UploadInput {
    /// Download, validate and process this URL first.
    Remote(String),
    /// Read and process a file on this host.
    Local(PathBuf),
    Processed(ProcessedImage),
}

/// A cover that now lives in the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub url: String,
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub content_hash: String,
    /// An identical object already existed; nothing was written.
    pub reused: bool,
}

/// Limits applied to remote downloads and stored objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub download_timeout: Duration,
    pub max_download_bytes: u64,
    pub max_stored_bytes: u64,
}
impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            download_timeout: config.download_timeout(),
            max_download_bytes: config.max_download_bytes,
            max_stored_bytes: config.max_stored_bytes,
        }
    }
}

pub struct Uploader {
    http: Arc<dyn HttpClient>,
    processor: Arc<dyn ImageProcessor>,
    origin: OriginPolicy,
    backend: BackendHandle,
    existence: ExistenceCache,
    url_base: Option<String>,
    limits: UploadLimits,
    write_disabled: bool,
}
impl Uploader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: Arc<dyn HttpClient>,
        processor: Arc<dyn ImageProcessor>,
        origin: OriginPolicy,
        backend: BackendHandle,
        existence: ExistenceCache,
        url_base: Option<String>,
        limits: UploadLimits,
        write_disabled: bool,
    ) -> Self {
        Self {
            http,
            processor,
            origin,
            backend,
            existence,
            url_base,
            limits,
            write_disabled,
        }
    }

    /// Run the whole pipeline for one image.
    ///
    /// # Errors
    /// Every variant of [`ErrorKind`]; the step that failed is also recorded in
    /// `provenance`.
    #[tracing::instrument(level = "debug", skip(self, source, input, provenance), fields(source = %source))]
    pub async fn upload(
        &self,
        book_id: &str,
        source: &CoverSource,
        input: UploadInput,
        provenance: &mut Provenance,
    ) -> Result<Uploaded> {
        let image = match input {
            UploadInput::Processed(image) => image,
            UploadInput::Remote(url) => {
                let bytes = self.download(&url, source, provenance).await?;
                self.process(bytes, &url, source, provenance).await?
            },
            UploadInput::Local(path) => {
                let bytes = self.read_local(&path, source, provenance).await?;
                self.process(bytes, &path.display().to_string(), source, provenance).await?
            },
        };

        let size = image.bytes.len() as u64;
        if size > self.limits.max_stored_bytes {
            let limit = self.limits.max_stored_bytes;
            provenance.failure(source.clone(), None, AttemptStatus::Failed, format!("size {size} > {limit}"));
            exn::bail!(ErrorKind::SizeExceeded { size, limit });
        }

        // Resolve the URL base up front so nothing is written that can't be served.
        let Some(base) = self.url_base.as_deref() else {
            provenance.failure(source.clone(), None, AttemptStatus::Failed, ErrorKind::UrlBaseUnresolved);
            exn::bail!(ErrorKind::UrlBaseUnresolved);
        };

        let key = canonical_key(book_id, image.extension, source);
        let hash = content_hash(&image.bytes);
        let reused = self.store(book_id, &key, &hash, &image, source, provenance).await?;
        let url = public_url(base, &key);
        provenance.success(source.clone(), &url);
        Ok(Uploaded {
            url,
            key,
            width: image.width,
            height: image.height,
            content_hash: hash,
            reused,
        })
    }

    /// Download `url`, following at most [`MAX_REDIRECTS`] redirects. Every
    /// hop is validated by the [`OriginPolicy`] before it is requested.
    async fn download(&self, url: &str, source: &CoverSource, provenance: &mut Provenance) -> Result<Vec<u8>> {
        let mut current = url.to_string();
        for _ in 0..=MAX_REDIRECTS {
            let checked = match self.origin.check(&current).await {
                Ok(checked) => checked,
                Err(err) => {
                    provenance.failure(source.clone(), Some(&current), AttemptStatus::Skipped, &*err);
                    tracing::info!(url = %current, reason = %err, "Refusing to download cover");
                    return Err(err);
                },
            };
            provenance.step(source.clone(), Some(&current), "origin allowed");
            let limits = &self.limits;
            let download =
                self.http.get_bytes(checked.as_str(), limits.download_timeout, limits.max_download_bytes).await;
            let err = match download {
                Ok(download) => {
                    let detail = format!("downloaded {} bytes", download.bytes.len());
                    provenance.step(source.clone(), Some(&current), detail);
                    return Ok(download.bytes);
                },
                Err(err) => err,
            };
            if let FetchErrorKind::Redirect { location, .. } = &*err {
                let next = match checked.join(location) {
                    Ok(next) => next,
                    Err(parse) => {
                        let reason = format!("invalid redirect to {location}: {parse}");
                        provenance.failure(source.clone(), Some(&current), AttemptStatus::Skipped, &reason);
                        exn::bail!(ErrorKind::OriginRejected(reason));
                    },
                };
                tracing::debug!(from = %current, to = %next, "Following cover redirect");
                provenance.step(source.clone(), Some(&current), format!("redirected to {next}"));
                current = next.to_string();
                continue;
            }
            let status = match err.class() {
                FailureClass::Timeout => AttemptStatus::Timeout,
                FailureClass::NotFound => AttemptStatus::NotFound,
                FailureClass::RateLimited | FailureClass::Hard => AttemptStatus::Failed,
            };
            provenance.failure(source.clone(), Some(&current), status, &*err);
            let reason = err.to_string();
            return Err(err).or_raise(|| ErrorKind::DownloadFailed(reason));
        }
        let reason = format!("more than {MAX_REDIRECTS} redirects");
        provenance.failure(source.clone(), Some(url), AttemptStatus::Failed, &reason);
        exn::bail!(ErrorKind::DownloadFailed(reason))
    }

    async fn read_local(&self, path: &Path, source: &CoverSource, provenance: &mut Provenance) -> Result<Vec<u8>> {
        let shown = path.display().to_string();
        let limit = self.limits.max_download_bytes;
        let read = async {
            let len = tokio::fs::metadata(path).await?.len();
            if len > limit {
                return Err(std::io::Error::other(format!("file is {len} bytes, limit is {limit}")));
            }
            tokio::fs::read(path).await
        };
        match read.await {
            Ok(bytes) => {
                provenance.step(source.clone(), Some(&shown), format!("read {} bytes", bytes.len()));
                Ok(bytes)
            },
            Err(err) => {
                provenance.failure(source.clone(), Some(&shown), AttemptStatus::Failed, &err);
                exn::bail!(ErrorKind::LocalReadFailed(format!("{shown}: {err}")))
            },
        }
    }

    async fn process(
        &self,
        bytes: Vec<u8>,
        url: &str,
        source: &CoverSource,
        provenance: &mut Provenance,
    ) -> Result<ProcessedImage> {
        let image = self.processor.process(bytes).await.inspect_err(|err| {
            provenance.failure(source.clone(), Some(url), AttemptStatus::Failed, &**err);
        })?;
        let detail = format!("processed {}x{} {}", image.width, image.height, image.extension);
        provenance.step(source.clone(), Some(url), detail);
        Ok(image)
    }

    /// Write `image` under `key` unless an object of the same length is
    /// already there. Returns whether the existing object was reused.
    async fn store(
        &self,
        book_id: &str,
        key: &str,
        hash: &str,
        image: &ProcessedImage,
        source: &CoverSource,
        provenance: &mut Provenance,
    ) -> Result<bool> {
        let size = image.bytes.len() as u64;
        match self.existence.size(self.backend.as_ref(), key).await {
            Ok(Some(existing)) if existing == size => {
                tracing::debug!(key, hash, "Identical cover already stored, skipping upload");
                provenance.step(source.clone(), Some(key), "reused existing object");
                return Ok(true);
            },
            Ok(Some(existing)) => tracing::debug!(key, existing, size, "Stored cover differs, replacing"),
            Ok(None) => self.find_legacy(book_id, image.extension, source, provenance).await,
            // Can't tell, so write; a redundant put is harmless.
            Err(err) => tracing::debug!(key, error = %err, "Existence check failed"),
        }

        let meta = ObjectMeta::new(image.content_type)
            .with_dimensions(image.width, image.height)
            .with_content_hash(hash)
            .with_source(source.as_str());
        if let Err(err) = self.backend.put(key, &image.bytes, &meta).await {
            provenance.failure(source.clone(), Some(key), AttemptStatus::Failed, &*err);
            self.existence.forget(key).await;
            return Err(err).or_raise(|| ErrorKind::UploadFailed);
        }
        if !self.write_disabled {
            self.existence.mark(key, size).await;
        }
        tracing::info!(key, hash, bytes = size, backend = self.backend.name(), "Stored cover");
        provenance.step(source.clone(), Some(key), "stored");
        Ok(false)
    }

    /// Legacy copies are left where they are; the canonical key is written
    /// regardless.
    async fn find_legacy(&self, book_id: &str, extension: &str, source: &CoverSource, provenance: &mut Provenance) {
        for key in legacy_keys(book_id, extension, source) {
            if let Ok(Some(_)) = self.existence.size(self.backend.as_ref(), &key).await {
                tracing::debug!(legacy_key = %key, "Cover exists under a legacy key");
                provenance.step(source.clone(), Some(&key), "legacy copy found");
                return;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    pub(crate) use super::origin::tests::StaticResolver;
    use super::*;
    use async_trait::async_trait;
    use folio_fetch::Download;
    use folio_fetch::error::Result as FetchResult;
    use parking_lot::Mutex;
    use folio_storage::StorageBackend;
    use folio_storage::backend::{MockBackend, ReadOnlyBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub(crate) struct Counter(AtomicUsize);
    impl Counter {
        pub(crate) fn bump(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        pub(crate) fn get(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    pub(crate) const CDN: &str = "https://cdn.example.com";
    pub(crate) const IMAGE_URL: &str = "https://books.google.com/cover.jpg";

    /// Serves the same bytes for every download, or a fixed status. URLs in
    /// `redirects` answer with a 302 to the mapped location instead.
    pub(crate) struct FakeDownloads {
        pub(crate) body: std::result::Result<Vec<u8>, u16>,
        pub(crate) redirects: Vec<(String, String)>,
        pub(crate) requested: Mutex<Vec<String>>,
        pub(crate) calls: Counter,
    }
    impl FakeDownloads {
        pub(crate) fn ok(body: impl Into<Vec<u8>>) -> Self {
            Self {
                body: Ok(body.into()),
                redirects: Vec::new(),
                requested: Mutex::new(Vec::new()),
                calls: Counter::default(),
            }
        }

        pub(crate) fn status(status: u16) -> Self {
            Self {
                body: Err(status),
                ..Self::ok(Vec::new())
            }
        }

        pub(crate) fn redirect(mut self, from: &str, to: &str) -> Self {
            self.redirects.push((from.to_string(), to.to_string()));
            self
        }

        pub(crate) fn count(&self) -> usize {
            self.calls.get()
        }
    }
    #[async_trait]
    impl HttpClient for FakeDownloads {
        async fn get_json(&self, url: &str, _timeout: Duration) -> FetchResult<serde_json::Value> {
            exn::bail!(FetchErrorKind::from_status(404, url))
        }

        async fn get_bytes(&self, url: &str, _timeout: Duration, _max_bytes: u64) -> FetchResult<Download> {
            self.calls.bump();
            self.requested.lock().push(url.to_string());
            if let Some((_, to)) = self.redirects.iter().find(|(from, _)| from == url) {
                exn::bail!(FetchErrorKind::Redirect {
                    status: 302,
                    location: to.clone(),
                });
            }
            match &self.body {
                Ok(bytes) => Ok(Download {
                    bytes: bytes.clone(),
                    content_type: Some("image/jpeg".to_string()),
                }),
                Err(status) => exn::bail!(FetchErrorKind::from_status(*status, url)),
            }
        }
    }

    /// Reports a fixed image for any input; fails on empty input.
    pub(crate) struct FakeProcessor {
        pub(crate) width: u32,
        pub(crate) height: u32,
        pub(crate) calls: Counter,
    }
    impl FakeProcessor {
        pub(crate) fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                calls: Counter::default(),
            }
        }
    }
    #[async_trait]
    impl ImageProcessor for FakeProcessor {
        async fn process(&self, bytes: Vec<u8>) -> Result<ProcessedImage> {
            self.calls.bump();
            if bytes.is_empty() {
                exn::bail!(ErrorKind::ProcessingFailed);
            }
            Ok(ProcessedImage {
                bytes,
                width: self.width,
                height: self.height,
                content_type: "image/jpeg",
                extension: "jpg",
            })
        }
    }

    pub(crate) struct Harness {
        pub(crate) http: Arc<FakeDownloads>,
        pub(crate) processor: Arc<FakeProcessor>,
        pub(crate) backend: Arc<MockBackend>,
    }
    impl Harness {
        pub(crate) fn new(http: FakeDownloads) -> Self {
            Self {
                http: Arc::new(http),
                processor: Arc::new(FakeProcessor::new(600, 900)),
                backend: Arc::new(MockBackend::default()),
            }
        }

        pub(crate) fn uploader(&self) -> Uploader {
            self.uploader_with(self.backend.clone(), Some(CDN.to_string()), false)
        }

        pub(crate) fn uploader_with(
            &self,
            backend: BackendHandle,
            url_base: Option<String>,
            write_disabled: bool,
        ) -> Uploader {
            let allowed = vec!["books.google.com".to_string()];
            Uploader::new(
                self.http.clone(),
                self.processor.clone(),
                OriginPolicy::new(&allowed, Arc::new(StaticResolver::default())),
                backend,
                ExistenceCache::new(Duration::from_secs(60), 100),
                url_base,
                UploadLimits::from(&UploadConfig::default()),
                write_disabled,
            )
        }
    }

    #[tokio::test]
    async fn test_uploads_under_canonical_key() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        let mut provenance = Provenance::new("b1");
        let uploaded = harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap();
        assert_eq!(uploaded.key, "images/book-covers/b1-lg-google-books.jpg");
        assert_eq!(uploaded.url, format!("{CDN}/images/book-covers/b1-lg-google-books.jpg"));
        assert_eq!((uploaded.width, uploaded.height), (600, 900));
        assert!(!uploaded.reused);
        assert_eq!(harness.backend.put_count(), 1);

        let info = harness.backend.head(&uploaded.key).await.unwrap().unwrap();
        assert_eq!(info.meta.width, Some(600));
        assert_eq!(info.meta.content_hash.as_deref(), Some(uploaded.content_hash.as_str()));
        assert_eq!(provenance.attempts.last().unwrap().status, AttemptStatus::Success);
    }

    #[tokio::test]
    async fn test_identical_object_is_not_uploaded_again() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        harness
            .backend
            .insert("images/book-covers/b1-lg-google-books.jpg", b"jpeg-bytes".to_vec(), ObjectMeta::default())
            .await;
        let mut provenance = Provenance::new("b1");
        let uploaded = harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap();
        assert!(uploaded.reused);
        assert_eq!(uploaded.url, format!("{CDN}/images/book-covers/b1-lg-google-books.jpg"));
        assert_eq!(harness.backend.put_count(), 0);
    }

    #[tokio::test]
    async fn test_legacy_copy_still_uploads_canonical() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        harness.backend.insert("images/book-covers/b1.jpg", b"jpeg-bytes".to_vec(), ObjectMeta::default()).await;
        let mut provenance = Provenance::new("b1");
        let uploaded = harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap();
        assert!(!uploaded.reused);
        assert_eq!(harness.backend.put_count(), 1);
        // The legacy object is left alone.
        assert!(harness.backend.exists("images/book-covers/b1.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_disallowed_host_is_never_downloaded() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        let mut provenance = Provenance::new("b1");
        let err = harness
            .uploader()
            .upload(
                "b1",
                &CoverSource::Longitood,
                UploadInput::Remote("https://evil.example.net/cover.jpg".to_string()),
                &mut provenance,
            )
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::OriginRejected(_)));
        assert_eq!(harness.http.count(), 0);
        assert_eq!(harness.processor.calls.get(), 0);
        assert_eq!(provenance.attempts[0].status, AttemptStatus::Skipped);
    }

    #[tokio::test]
    async fn test_download_failure() {
        let harness = Harness::new(FakeDownloads::status(503));
        let mut provenance = Provenance::new("b1");
        let err = harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::DownloadFailed(_)));
        let failed = provenance.attempts.last().unwrap();
        assert_eq!(failed.status, AttemptStatus::Timeout);
        assert_eq!(failed.url_attempted.as_deref(), Some(IMAGE_URL));
    }

    #[tokio::test]
    async fn test_redirect_to_internal_address_is_not_followed() {
        let http = FakeDownloads::ok(b"secret".to_vec()).redirect(IMAGE_URL, "http://169.254.169.254/latest/meta-data");
        let harness = Harness::new(http);
        let mut provenance = Provenance::new("b1");
        let err = harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::OriginRejected(_)));
        assert_eq!(harness.http.count(), 1);
        assert_eq!(harness.processor.calls.get(), 0);
        let rejected = provenance.attempts.last().unwrap();
        assert_eq!(rejected.status, AttemptStatus::Skipped);
        assert_eq!(rejected.url_attempted.as_deref(), Some("http://169.254.169.254/latest/meta-data"));
    }

    #[tokio::test]
    async fn test_redirect_to_allowed_host_is_followed() {
        let target = "https://books.google.com/covers/large.jpg";
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()).redirect(IMAGE_URL, "/covers/large.jpg"));
        let mut provenance = Provenance::new("b1");
        harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap();
        assert_eq!(*harness.http.requested.lock(), vec![IMAGE_URL.to_string(), target.to_string()]);
    }

    #[tokio::test]
    async fn test_redirect_loop_gives_up() {
        let loop_url = "https://books.google.com/loop.jpg";
        let http = FakeDownloads::ok(b"jpeg-bytes".to_vec())
            .redirect(IMAGE_URL, loop_url)
            .redirect(loop_url, IMAGE_URL);
        let harness = Harness::new(http);
        let mut provenance = Provenance::new("b1");
        let err = harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::DownloadFailed(_)));
        assert_eq!(harness.http.count(), MAX_REDIRECTS + 1);
    }

    fn details(provenance: &Provenance) -> Vec<&str> {
        provenance.attempts.iter().filter_map(|a| a.detail.as_deref()).collect()
    }

    #[tokio::test]
    async fn test_every_step_is_recorded_on_upload() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        let mut provenance = Provenance::new("b1");
        harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap();
        assert_eq!(details(&provenance), vec![
            "origin allowed",
            "downloaded 10 bytes",
            "processed 600x900 jpg",
            "stored"
        ]);
        assert!(provenance.attempts.iter().all(|a| a.status == AttemptStatus::Success));
        assert_eq!(provenance.attempts.len(), 5);
    }

    #[tokio::test]
    async fn test_every_step_is_recorded_on_reuse() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        harness
            .backend
            .insert("images/book-covers/b1-lg-google-books.jpg", b"jpeg-bytes".to_vec(), ObjectMeta::default())
            .await;
        let mut provenance = Provenance::new("b1");
        harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap();
        assert_eq!(details(&provenance), vec![
            "origin allowed",
            "downloaded 10 bytes",
            "processed 600x900 jpg",
            "reused existing object"
        ]);
    }

    #[tokio::test]
    async fn test_legacy_hit_is_recorded() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        harness.backend.insert("images/book-covers/b1.jpg", b"jpeg-bytes".to_vec(), ObjectMeta::default()).await;
        let mut provenance = Provenance::new("b1");
        harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap();
        let legacy = provenance.attempts.iter().find(|a| a.detail.as_deref() == Some("legacy copy found")).unwrap();
        assert_eq!(legacy.url_attempted.as_deref(), Some("images/book-covers/b1.jpg"));
        assert_eq!(details(&provenance).last(), Some(&"stored"));
    }

    #[tokio::test]
    async fn test_processing_failure_uploads_nothing() {
        let harness = Harness::new(FakeDownloads::ok(Vec::new()));
        let mut provenance = Provenance::new("b1");
        let err = harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::ProcessingFailed));
        assert_eq!(harness.backend.put_count(), 0);
    }

    #[tokio::test]
    async fn test_size_guard() {
        let harness = Harness::new(FakeDownloads::ok(vec![0u8; 6 * 1024 * 1024]));
        let mut provenance = Provenance::new("b1");
        let err = harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::SizeExceeded { .. }));
        assert_eq!(harness.backend.put_count(), 0);
    }

    #[tokio::test]
    async fn test_put_failure() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        harness.backend.set_fail_puts(true);
        let mut provenance = Provenance::new("b1");
        let err = harness
            .uploader()
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::UploadFailed));
    }

    #[tokio::test]
    async fn test_no_url_base() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        let mut provenance = Provenance::new("b1");
        let err = harness
            .uploader_with(harness.backend.clone(), None, false)
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::UrlBaseUnresolved));
        assert_eq!(harness.backend.put_count(), 0);
    }

    #[tokio::test]
    async fn test_write_disabled_still_resolves_url() {
        let harness = Harness::new(FakeDownloads::ok(b"jpeg-bytes".to_vec()));
        let readonly = Arc::new(ReadOnlyBackend::new(harness.backend.clone()));
        let mut provenance = Provenance::new("b1");
        let uploaded = harness
            .uploader_with(readonly, Some(CDN.to_string()), true)
            .upload("b1", &CoverSource::GoogleBooks, UploadInput::Remote(IMAGE_URL.to_string()), &mut provenance)
            .await
            .unwrap();
        assert!(uploaded.url.starts_with(CDN));
        assert!(harness.backend.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_local_file_is_uploaded_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        std::fs::write(&path, b"jpeg-bytes").unwrap();
        let harness = Harness::new(FakeDownloads::ok(b"unused".to_vec()));
        let mut provenance = Provenance::new("b1");
        let uploaded = harness
            .uploader()
            .upload("b1", &CoverSource::LocalCache, UploadInput::Local(path), &mut provenance)
            .await
            .unwrap();
        assert_eq!(uploaded.key, "images/book-covers/b1-lg-local-cache.jpg");
        assert_eq!(harness.http.count(), 0);
        assert_eq!(harness.backend.put_count(), 1);
        assert_eq!(details(&provenance)[0], "read 10 bytes");
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let harness = Harness::new(FakeDownloads::ok(b"unused".to_vec()));
        let mut provenance = Provenance::new("b1");
        let err = harness
            .uploader()
            .upload("b1", &CoverSource::LocalCache, UploadInput::Local(dir.path().join("gone.jpg")), &mut provenance)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::LocalReadFailed(_)));
        assert_eq!(harness.backend.put_count(), 0);
    }

    #[tokio::test]
    async fn test_processed_input_skips_download() {
        let harness = Harness::new(FakeDownloads::ok(b"unused".to_vec()));
        let image = ProcessedImage {
            bytes: b"png-bytes".to_vec(),
            width: 300,
            height: 450,
            content_type: "image/png",
            extension: "png",
        };
        let mut provenance = Provenance::new("b1");
        let uploaded = harness
            .uploader()
            .upload("b1", &CoverSource::OpenLibrary, UploadInput::Processed(image), &mut provenance)
            .await
            .unwrap();
        assert_eq!(uploaded.key, "images/book-covers/b1-lg-open-library.png");
        assert_eq!(harness.http.count(), 0);
        assert_eq!(harness.processor.calls.get(), 0);
    }
}
