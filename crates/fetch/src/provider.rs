//! The uniform fetch capability and the guard chain around external providers.

use crate::error::{ErrorKind, FailureClass};
use crate::guard::{CircuitBreaker, KnownBad, Limiter};
use crate::http::HttpClient;
use async_trait::async_trait;
use folio_config::ProviderConfig;
use folio_cover::identifier::preferred_isbn;
use folio_cover::{Attempt, AttemptStatus, Book, CoverCandidate, CoverSource};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of asking one source about one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
    pub candidate: Option<CoverCandidate>,
    /// What happened, for the provenance record.
    pub attempt: Attempt,
}
impl Fetch {
    pub fn found(candidate: CoverCandidate) -> Self {
        let attempt = Attempt::success(candidate.source.clone(), candidate.url.clone());
        Self {
            candidate: Some(candidate),
            attempt,
        }
    }

    pub fn missing(attempt: Attempt) -> Self {
        Self {
            candidate: None,
            attempt,
        }
    }

    pub fn skipped(source: CoverSource, reason: &str) -> Self {
        Self::missing(Attempt::failed(source, None, AttemptStatus::Skipped, reason))
    }
}

/// A single place a cover might come from.
///
/// Implementations never fail: every error is folded into a [`Fetch`] with no
/// candidate and an attempt describing why.
#[async_trait]
pub trait CoverFetcher: Send + Sync {
    fn source(&self) -> CoverSource;

    async fn fetch(&self, book: &Book) -> Fetch;
}

pub type FetcherHandle = Arc<dyn CoverFetcher>;

/// The provider-specific half of an external fetcher: how to build the
/// request and how to read the answer.
pub trait ProviderApi: Send + Sync {
    fn source(&self) -> CoverSource;

    /// Identifier to query the provider with.
    fn lookup_id(&self, book: &Book) -> Option<String> {
        preferred_isbn(book)
    }

    fn request_url(&self, id: &str) -> String;

    /// Pull a candidate out of a JSON response. `None` means the provider
    /// answered but has no cover.
    fn extract(&self, id: &str, body: &serde_json::Value) -> Option<CoverCandidate>;
}

/// External provider wrapped in the known-bad, rate-limit and circuit-breaker
/// guards, applied in that order.
pub struct GuardedFetcher<P> {
    api: P,
    http: Arc<dyn HttpClient>,
    known_bad: KnownBad,
    limiter: Limiter,
    breaker: Option<CircuitBreaker>,
    timeout: Duration,
}
impl<P: ProviderApi> GuardedFetcher<P> {
    pub fn new(api: P, http: Arc<dyn HttpClient>, known_bad: KnownBad, config: &ProviderConfig) -> Self {
        let breaker = config
            .circuit_breaker
            .then(|| CircuitBreaker::new(config.failure_threshold, config.break_duration()));
        Self {
            api,
            http,
            known_bad,
            limiter: Limiter::new(config.requests_per_second, config.burst),
            breaker,
            timeout: config.timeout(),
        }
    }

    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref()
    }

    async fn handle_error(&self, id: &str, url: String, err: &ErrorKind) -> Fetch {
        let source = self.api.source();
        let status = match err.class() {
            FailureClass::NotFound => {
                self.known_bad.mark(&source, id).await;
                AttemptStatus::NotFound
            },
            FailureClass::Timeout => AttemptStatus::Timeout,
            FailureClass::RateLimited | FailureClass::Hard => AttemptStatus::Failed,
        };
        tracing::debug!(source = %source, url = %url, error = %err, "Provider lookup failed");
        Fetch::missing(Attempt::failed(source, Some(url), status, err))
    }
}

#[async_trait]
impl<P: ProviderApi> CoverFetcher for GuardedFetcher<P> {
    fn source(&self) -> CoverSource {
        self.api.source()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(source = %self.api.source(), book_id = %book.id))]
    async fn fetch(&self, book: &Book) -> Fetch {
        let source = self.api.source();
        let Some(id) = self.api.lookup_id(book) else {
            return Fetch::skipped(source, "no usable identifier");
        };
        if self.known_bad.contains(&source, &id).await {
            return Fetch::skipped(source, "known-bad identifier");
        }
        if !self.limiter.try_acquire() {
            tracing::info!(source = %source, id = %id, "Rate limit reached, skipping provider");
            return Fetch::skipped(source, "rate limited");
        }
        let permit = match &self.breaker {
            Some(breaker) => match breaker.enter() {
                Some(permit) => Some(permit),
                None => {
                    tracing::debug!(source = %source, "Circuit open, skipping provider");
                    return Fetch::skipped(source, "circuit open");
                },
            },
            None => None,
        };

        let url = self.api.request_url(&id);
        let result = self.http.get_json(&url, self.timeout).await;
        if let Some(permit) = permit {
            permit.settle(result.as_ref().map_or_else(|err| !err.counts_against_provider(), |_| true));
        }
        match result {
            Ok(body) => {
                match self.api.extract(&id, &body) {
                    Some(candidate) => Fetch::found(candidate),
                    None => {
                        self.known_bad.mark(&source, &id).await;
                        Fetch::missing(Attempt::failed(source, Some(url), AttemptStatus::NotFound, "no cover in response"))
                    },
                }
            },
            Err(err) => self.handle_error(&id, url, &err).await,
        }
    }
}
