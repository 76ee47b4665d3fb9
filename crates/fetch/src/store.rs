//! Looks for a cover that is already sitting in durable object storage.

use crate::provider::{CoverFetcher, Fetch};
use async_trait::async_trait;
use folio_cover::keys::{lookup_keys, public_url};
use folio_cover::{Attempt, AttemptStatus, Book, CoverCandidate, CoverSource};
use folio_storage::{BackendHandle, ObjectInfo};
use std::time::Duration;

/// Searches the object store with HEAD requests under every key a cover for the
/// book may have been written to, returning the first hit.
///
/// The whole search shares one time budget; running out of it is reported as a
/// timeout, not an error.
pub struct ObjectStoreFetcher {
    backend: BackendHandle,
    url_base: Option<String>,
    sources: Vec<CoverSource>,
    timeout: Duration,
}
impl ObjectStoreFetcher {
    /// `sources` decides which canonical key variants are tried, and in what
    /// order.
    pub fn new(backend: BackendHandle, url_base: Option<String>, sources: Vec<CoverSource>, timeout: Duration) -> Self {
        Self {
            backend,
            url_base,
            sources,
            timeout,
        }
    }

    /// Keys to try for `book`, the previously recorded key first.
    pub fn candidate_keys(&self, book: &Book) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(key) = book.cached_cover_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            keys.push(key.to_string());
        }
        for key in lookup_keys(&book.id, &self.sources) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    async fn search(&self, keys: &[String]) -> Option<ObjectInfo> {
        for key in keys {
            match self.backend.head(key).await {
                Ok(Some(info)) => return Some(info),
                Ok(None) => {},
                Err(err) => tracing::debug!(key = %key, error = %err, "HEAD failed, trying next key"),
            }
        }
        None
    }

    /// Like [`fetch`](CoverFetcher::fetch), with a different time budget.
    #[tracing::instrument(level = "debug", skip_all, fields(backend = self.backend.name(), book_id = %book.id))]
    pub async fn fetch_within(&self, book: &Book, timeout: Duration) -> Fetch {
        let source = CoverSource::ObjectStore;
        let keys = self.candidate_keys(book);
        let info = match tokio::time::timeout(timeout, self.search(&keys)).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                return Fetch::missing(Attempt::failed(
                    source,
                    None,
                    AttemptStatus::NotFound,
                    format!("no object under {} keys", keys.len()),
                ));
            },
            Err(_) => {
                tracing::debug!(?timeout, "Object store search timed out");
                return Fetch::missing(Attempt::failed(source, None, AttemptStatus::Timeout, "HEAD timed out"));
            },
        };
        let key = info.key.clone();
        match self.candidate(info) {
            Some(candidate) => Fetch::found(candidate),
            None => Fetch::missing(Attempt::failed(source, Some(key), AttemptStatus::Failed, "no public URL base configured")),
        }
    }

    fn candidate(&self, info: ObjectInfo) -> Option<CoverCandidate> {
        let url = match &self.url_base {
            Some(base) => public_url(base, &info.key),
            None => return None,
        };
        let candidate = CoverCandidate::durable(url, CoverSource::ObjectStore, info.key);
        Some(match (info.meta.width, info.meta.height) {
            (Some(width), Some(height)) => candidate.with_dimensions(width, height),
            _ => candidate,
        })
    }
}

#[async_trait]
impl CoverFetcher for ObjectStoreFetcher {
    fn source(&self) -> CoverSource {
        CoverSource::ObjectStore
    }

    async fn fetch(&self, book: &Book) -> Fetch {
        self.fetch_within(book, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_cover::keys::canonical_key;
    use folio_storage::ObjectMeta;
    use folio_storage::backend::MockBackend;
    use std::sync::Arc;

    const BASE: &str = "https://cdn.example.com";

    fn fetcher(backend: Arc<MockBackend>, timeout: Duration) -> ObjectStoreFetcher {
        ObjectStoreFetcher::new(
            backend,
            Some(BASE.to_string()),
            vec![CoverSource::GoogleBooks, CoverSource::OpenLibrary],
            timeout,
        )
    }

    #[tokio::test]
    async fn test_finds_canonical_with_dimensions() {
        let backend = Arc::new(MockBackend::default());
        let key = canonical_key("b1", "jpg", &CoverSource::OpenLibrary);
        backend.insert(&key, b"jpeg".to_vec(), ObjectMeta::new("image/jpeg").with_dimensions(400, 600)).await;

        let fetch = fetcher(backend, Duration::from_secs(1)).fetch(&Book::new("b1")).await;
        let candidate = fetch.candidate.unwrap();
        assert_eq!(candidate.url, format!("{BASE}/{key}"));
        assert_eq!(candidate.storage_key.as_deref(), Some(key.as_str()));
        assert!(candidate.is_durable());
        assert_eq!(candidate.pixels(), 240_000);
        assert_eq!(fetch.attempt.status, AttemptStatus::Success);
    }

    #[tokio::test]
    async fn test_finds_png_cover() {
        let backend = Arc::new(MockBackend::default());
        let key = canonical_key("b1", "png", &CoverSource::GoogleBooks);
        backend.insert(&key, b"png".to_vec(), ObjectMeta::new("image/png").with_dimensions(400, 600)).await;

        let fetch = fetcher(backend, Duration::from_secs(1)).fetch(&Book::new("b1")).await;
        let candidate = fetch.candidate.unwrap();
        assert_eq!(candidate.url, format!("{BASE}/images/book-covers/b1-lg-google-books.png"));
        assert_eq!(candidate.pixels(), 240_000);
    }

    #[tokio::test]
    async fn test_finds_legacy_key() {
        let backend = Arc::new(MockBackend::with_objects([("images/book-covers/b1.jpg", b"jpeg".to_vec())]));
        let fetch = fetcher(backend, Duration::from_secs(1)).fetch(&Book::new("b1")).await;
        assert_eq!(fetch.candidate.unwrap().url, format!("{BASE}/images/book-covers/b1.jpg"));
    }

    #[tokio::test]
    async fn test_recorded_key_is_tried_first() {
        let backend = Arc::new(MockBackend::with_objects([("covers/custom.jpg", b"jpeg".to_vec())]));
        let book = Book::new("b1").with_cached_cover("https://old/custom.jpg", Some("covers/custom.jpg".to_string()));
        let fetch = fetcher(backend.clone(), Duration::from_secs(1)).fetch(&book).await;
        assert!(fetch.candidate.is_some());
        assert_eq!(backend.head_count(), 1);
    }

    #[tokio::test]
    async fn test_miss() {
        let backend = Arc::new(MockBackend::default());
        let fetcher = fetcher(backend.clone(), Duration::from_secs(1));
        let expected = fetcher.candidate_keys(&Book::new("b1")).len();
        let fetch = fetcher.fetch(&Book::new("b1")).await;
        assert!(fetch.candidate.is_none());
        assert_eq!(fetch.attempt.status, AttemptStatus::NotFound);
        assert_eq!(backend.head_count(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let backend = Arc::new(MockBackend::with_objects([("images/book-covers/b1.jpg", b"jpeg".to_vec())]));
        backend.set_head_delay(Duration::from_secs(5));
        let fetch = fetcher(backend, Duration::from_millis(300)).fetch(&Book::new("b1")).await;
        assert!(fetch.candidate.is_none());
        assert_eq!(fetch.attempt.status, AttemptStatus::Timeout);
    }

    #[tokio::test]
    async fn test_no_url_base() {
        let backend = Arc::new(MockBackend::with_objects([("images/book-covers/b1.jpg", b"jpeg".to_vec())]));
        let fetcher = ObjectStoreFetcher::new(backend, None, vec![CoverSource::GoogleBooks], Duration::from_secs(1));
        let fetch = fetcher.fetch(&Book::new("b1")).await;
        assert!(fetch.candidate.is_none());
        assert_eq!(fetch.attempt.status, AttemptStatus::Failed);
    }
}
