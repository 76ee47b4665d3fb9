//! Cover resolution: a fast synchronous answer and a background upgrade.
//!
//! [`CoverResolver::resolve`] never fails and never waits on a provider. It
//! answers from the memory caches, a short existence check against the
//! object store, or whatever the book already carries, falling back to the
//! placeholder. It then schedules a background resolution that fetches from
//! every source, selects the best candidate, makes it durable, persists the
//! canonical record and announces the result.

mod background;
pub mod error;

pub use self::background::{BackgroundPool, catch_panic};
use self::error::{Error, ErrorKind, Result};
use crate::cache::{CacheHit, CoverCache};
use crate::notify::{CoverUpdated, Notifier};
use crate::upload::{UploadInput, Uploaded, Uploader};
use exn::{OptionExt, ResultExt};
use folio_catalog::{CoverLink, CoverStore};
use folio_cover::{
    AttemptStatus, Book, BookKey, CoverCandidate, CoverSource, Provenance, ResolvedCover, SelectionPolicy,
    StorageLocation,
};
use folio_fetch::{FetcherHandle, ObjectStoreFetcher};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Where the fast path found its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOrigin {
    FinalCache,
    ObjectStore,
    ProvisionalCache,
    /// A cover URL the book record already carried.
    Book,
    Placeholder,
}

/// What the request path gets back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverResponse {
    pub url: String,
    pub origin: AnswerOrigin,
    /// `None` when the book has no identifier.
    pub cache_key: Option<String>,
    /// Whether a background resolution was queued.
    pub scheduled: bool,
}

/// How a background resolution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A different cover than before is now final.
    Upgraded(ResolvedCover),
    /// The same cover was selected again.
    Unchanged(ResolvedCover),
    /// Nothing usable was found, or the run failed; the fallback is final.
    Failed(ResolvedCover),
}
impl Outcome {
    pub fn cover(&self) -> &ResolvedCover {
        match self {
            Self::Upgraded(cover) | Self::Unchanged(cover) | Self::Failed(cover) => cover,
        }
    }
}

pub(crate) struct Inner {
    pub(crate) cache: CoverCache,
    pub(crate) cache_enabled: bool,
    pub(crate) policy: SelectionPolicy,
    pub(crate) high_resolution_pixels: u64,
    pub(crate) providers: Vec<FetcherHandle>,
    pub(crate) store: Arc<ObjectStoreFetcher>,
    pub(crate) fast_head_timeout: Duration,
    pub(crate) uploader: Uploader,
    pub(crate) catalog: Option<Arc<dyn CoverStore>>,
    pub(crate) notifier: Notifier,
    pub(crate) pool: BackgroundPool,
}

/// Entry point of the pipeline. Cheap to clone.
#[derive(Clone)]
pub struct CoverResolver {
    inner: Arc<Inner>,
}
impl CoverResolver {
    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self { inner: Arc::new(inner) }
    }

    pub fn cache(&self) -> &CoverCache {
        &self.inner.cache
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.inner.policy
    }

    /// External providers consulted on every background run.
    pub fn provider_count(&self) -> usize {
        self.inner.providers.len()
    }

    /// Resolutions queued or running.
    pub fn in_flight(&self) -> usize {
        self.inner.pool.in_flight()
    }

    /// Answer immediately and schedule a background upgrade.
    #[tracing::instrument(level = "debug", skip_all, fields(book_id = %book.id))]
    pub async fn resolve(&self, book: &Book) -> CoverResponse {
        self.resolve_with_handle(book).await.0
    }

    /// [`resolve`](Self::resolve), also returning the background task so
    /// callers (and tests) can wait for it.
    pub async fn resolve_with_handle(&self, book: &Book) -> (CoverResponse, Option<JoinHandle<Outcome>>) {
        let key = match cache_key(book) {
            Ok(key) => key,
            Err(err) => {
                tracing::debug!(book_id = %book.id, error = ?err, "Serving placeholder");
                let response = CoverResponse {
                    url: self.inner.policy.placeholder().to_string(),
                    origin: AnswerOrigin::Placeholder,
                    cache_key: None,
                    scheduled: false,
                };
                return (response, None);
            },
        };

        let (url, origin) = self.fast_lookup(&key, book).await;
        let handle = if self.inner.cache_enabled {
            let this = self.clone();
            let background_key = key.clone();
            let book = book.clone();
            self.inner.pool.spawn(async move { this.run(&background_key, &book).await })
        } else {
            None
        };
        let response = CoverResponse {
            url,
            origin,
            cache_key: Some(key),
            scheduled: handle.is_some(),
        };
        (response, handle)
    }

    /// Final cache, object store, provisional cache, the book's own cover
    /// URLs, placeholder.
    async fn fast_lookup(&self, key: &str, book: &Book) -> (String, AnswerOrigin) {
        let inner = &self.inner;
        if inner.cache_enabled
            && let Some(cover) = inner.cache.get_final(key).await
        {
            return (cover.url, AnswerOrigin::FinalCache);
        }

        let lookup = inner.store.fetch_within(book, inner.fast_head_timeout).await;
        if let Some(candidate) = lookup.candidate {
            if inner.cache_enabled {
                inner.cache.put_provisional(key, candidate.url.clone()).await;
            }
            return (candidate.url, AnswerOrigin::ObjectStore);
        }

        if inner.cache_enabled
            && let Some(hit) = inner.cache.lookup(key).await
        {
            let origin = match hit {
                CacheHit::Final(_) => AnswerOrigin::FinalCache,
                CacheHit::Provisional(_) => AnswerOrigin::ProvisionalCache,
            };
            return (hit.url().to_string(), origin);
        }

        let known = [book.cached_cover_url.as_deref(), book.external_cover_url.as_deref()];
        if let Some(url) = known.into_iter().flatten().map(str::trim).find(|u| !u.is_empty()) {
            return (url.to_string(), AnswerOrigin::Book);
        }
        (inner.policy.placeholder().to_string(), AnswerOrigin::Placeholder)
    }

    /// One complete background resolution. Never panics past this point.
    #[tracing::instrument(level = "debug", skip(self, book), fields(book_id = %book.id))]
    pub async fn run(&self, key: &str, book: &Book) -> Outcome {
        let mut provenance = Provenance::new(&book.id);
        let result = catch_panic(self.run_inner(key, book, &mut provenance)).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(message) => {
                let err = Error::from(ErrorKind::Panicked(message));
                tracing::error!(cache_key = %key, error = ?err, "Background cover resolution failed");
                let placeholder = self.placeholder();
                self.commit(key, book, placeholder.clone(), false, &mut provenance, "background task failed").await;
                Outcome::Failed(placeholder)
            },
        };
        provenance.log();
        outcome
    }

    async fn run_inner(&self, key: &str, book: &Book, provenance: &mut Provenance) -> Outcome {
        if book.needs_migration()
            && !self.already_durable(key, book).await
            && let Some(outcome) = self.migrate_external(key, book, provenance).await
        {
            return outcome;
        }

        let store: FetcherHandle = self.inner.store.clone();
        let mut fetchers = vec![store];
        fetchers.extend(self.inner.providers.iter().cloned());
        let fetches = join_all(fetchers.iter().map(|fetcher| fetcher.fetch(book))).await;
        let mut candidates = Vec::with_capacity(fetches.len());
        for fetch in fetches {
            provenance.push(fetch.attempt);
            candidates.push(fetch.candidate);
        }

        let selection = self.inner.policy.select(candidates);
        let best = match selection.best.ok_or_raise(|| ErrorKind::AllSourcesExhausted) {
            Ok(best) => best,
            Err(err) => {
                tracing::info!(cache_key = %key, reason = %selection.reason, error = ?err, "No usable cover found");
                let placeholder = self.placeholder();
                self.commit(key, book, placeholder.clone(), false, provenance, &selection.reason).await;
                return Outcome::Failed(placeholder);
            },
        };

        if best.location == StorageLocation::Durable {
            let cover = self.resolved(best);
            return self.commit(key, book, cover, true, provenance, &selection.reason).await;
        }

        // Serve the candidate while the upload runs.
        self.inner.cache.put_provisional(key, best.url.clone()).await;
        let source = best.source.clone();
        let input = match best.location {
            StorageLocation::Local => UploadInput::Local(PathBuf::from(best.url.trim_start_matches("file://"))),
            StorageLocation::Durable | StorageLocation::None => UploadInput::Remote(best.url.clone()),
        };
        match self.upload(book, &source, input, provenance).await {
            Ok(uploaded) => {
                let cover = self.durable(&best, uploaded);
                self.commit(key, book, cover, true, provenance, &selection.reason).await
            },
            Err(err) => {
                tracing::warn!(cache_key = %key, url = %best.url, error = ?err, "Keeping cover at its provider");
                let cover = self.resolved(best);
                let reason = format!("{} (upload failed)", selection.reason);
                self.commit(key, book, cover, false, provenance, &reason).await
            },
        }
    }

    /// Whether an earlier run already stored a cover for this book, either
    /// in the final cache or in the catalog.
    async fn already_durable(&self, key: &str, book: &Book) -> bool {
        if let Some(cover) = self.inner.cache.get_final(key).await
            && cover.location == StorageLocation::Durable
        {
            return true;
        }
        let Some(catalog) = &self.inner.catalog else {
            return false;
        };
        match catalog.get_canonical(&book.id).await {
            Ok(link) => link.is_some_and(|link| link.storage_key.is_some()),
            Err(err) => {
                tracing::debug!(book_id = %book.id, error = ?err, "Catalog lookup failed before migration");
                false
            },
        }
    }

    /// A book that only has a provider URL gets that URL stored before any
    /// search runs. `None` means the migration didn't happen.
    async fn migrate_external(&self, key: &str, book: &Book, provenance: &mut Provenance) -> Option<Outcome> {
        let url = book.external_cover_url.as_deref()?.trim().to_string();
        let source = source_for_url(&url);
        match self.upload(book, &source, UploadInput::Remote(url.clone()), provenance).await {
            Ok(uploaded) => {
                let candidate = CoverCandidate::external(url, source);
                let cover = self.durable(&candidate, uploaded);
                Some(self.commit(key, book, cover, true, provenance, "migrated external cover").await)
            },
            Err(err) => {
                tracing::info!(cache_key = %key, error = ?err, "External cover migration failed, searching sources");
                None
            },
        }
    }

    async fn upload(
        &self,
        book: &Book,
        source: &CoverSource,
        input: UploadInput,
        provenance: &mut Provenance,
    ) -> Result<Uploaded> {
        self.inner
            .uploader
            .upload(&book.id, source, input, provenance)
            .await
            .or_raise(|| ErrorKind::Upload)
    }

    /// Make `cover` final for `key`, optionally persist it, and announce it.
    async fn commit(
        &self,
        key: &str,
        book: &Book,
        cover: ResolvedCover,
        persist: bool,
        provenance: &mut Provenance,
        reason: &str,
    ) -> Outcome {
        let inner = &self.inner;
        let previous = inner.cache.get_final(key).await;
        inner.cache.put_final(key, cover.clone()).await;
        if persist && let Err(err) = self.persist(book, &cover).await {
            // The memory cache keeps the new cover regardless.
            tracing::warn!(cache_key = %key, error = ?err, "Canonical cover not persisted");
            provenance.failure(cover.source.clone(), Some(cover.url.as_str()), AttemptStatus::Failed, &*err);
        }
        inner.notifier.publish(CoverUpdated {
            cache_key: key.to_string(),
            url: cover.url.clone(),
            book_id: book.id.clone(),
            source: cover.source.clone(),
        });
        provenance.select(&cover, reason);

        if cover.is_placeholder(inner.policy.placeholder()) {
            Outcome::Failed(cover)
        } else if previous.as_ref() == Some(&cover) {
            Outcome::Unchanged(cover)
        } else {
            Outcome::Upgraded(cover)
        }
    }

    async fn persist(&self, book: &Book, cover: &ResolvedCover) -> Result<()> {
        let Some(catalog) = &self.inner.catalog else {
            return Ok(());
        };
        catalog.upsert(&CoverLink::canonical(&book.id, cover)).await.or_raise(|| ErrorKind::PersistenceFailed)
    }

    fn placeholder(&self) -> ResolvedCover {
        ResolvedCover::placeholder(self.inner.policy.placeholder())
    }

    fn resolved(&self, candidate: CoverCandidate) -> ResolvedCover {
        ResolvedCover::from_candidate(candidate, self.inner.high_resolution_pixels)
    }

    fn durable(&self, original: &CoverCandidate, uploaded: Uploaded) -> ResolvedCover {
        let candidate = CoverCandidate {
            high_resolution: original.high_resolution,
            source_system_id: original.source_system_id.clone(),
            ..CoverCandidate::durable(uploaded.url, original.source.clone(), uploaded.key)
                .with_dimensions(uploaded.width, uploaded.height)
        };
        self.resolved(candidate)
    }
}

fn cache_key(book: &Book) -> Result<String> {
    let key = BookKey::resolve(book).or_raise(|| ErrorKind::NoIdentifier)?;
    Ok(key.as_str().to_string())
}

/// Best guess at which provider a bare cover URL belongs to.
pub fn source_for_url(url: &str) -> CoverSource {
    let host = reqwest::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase));
    match host.as_deref() {
        Some(h) if h == "books.google.com" || h.ends_with(".googleusercontent.com") => CoverSource::GoogleBooks,
        Some(h) if h.ends_with("openlibrary.org") || h.ends_with(".archive.org") => CoverSource::OpenLibrary,
        _ => CoverSource::Unknown("external".to_string()),
    }
}
