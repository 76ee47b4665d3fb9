//! Provisional and final in-memory cover caches.
//!
//! The final cache holds the confirmed best [`ResolvedCover`] for a key for
//! hours; the provisional cache holds a best-effort URL for minutes while a
//! background resolution is still running. Writing a final entry supersedes
//! the provisional one.

use folio_config::CacheConfig;
use folio_cover::ResolvedCover;
use moka::future::Cache;

/// What the memory tier knows about a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheHit {
    Final(ResolvedCover),
    Provisional(String),
}
impl CacheHit {
    pub fn url(&self) -> &str {
        match self {
            Self::Final(cover) => &cover.url,
            Self::Provisional(url) => url,
        }
    }
}

/// Both memory caches. Cloning shares the underlying maps.
#[derive(Clone)]
pub struct CoverCache {
    resolved: Cache<String, ResolvedCover>,
    provisional: Cache<String, String>,
}
impl CoverCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            resolved: Cache::builder()
                .name("final-covers")
                .max_capacity(config.final_capacity)
                .time_to_live(config.final_ttl())
                .build(),
            provisional: Cache::builder()
                .name("provisional-covers")
                .max_capacity(config.provisional_capacity)
                .time_to_live(config.provisional_ttl())
                .build(),
        }
    }

    pub async fn get_final(&self, key: &str) -> Option<ResolvedCover> {
        self.resolved.get(key).await
    }

    pub async fn get_provisional(&self, key: &str) -> Option<String> {
        self.provisional.get(key).await
    }

    /// Final first, then provisional.
    ///
    /// A provisional hit is confirmed against the final cache once more, so a
    /// final entry committed between the two reads is never hidden behind the
    /// provisional URL it replaced.
    pub async fn lookup(&self, key: &str) -> Option<CacheHit> {
        if let Some(cover) = self.resolved.get(key).await {
            return Some(CacheHit::Final(cover));
        }
        let url = self.provisional.get(key).await?;
        match self.resolved.get(key).await {
            Some(cover) => Some(CacheHit::Final(cover)),
            None => Some(CacheHit::Provisional(url)),
        }
    }

    /// Commit a resolved cover. Last write wins.
    pub async fn put_final(&self, key: &str, cover: ResolvedCover) {
        self.resolved.insert(key.to_string(), cover).await;
        self.provisional.invalidate(key).await;
    }

    /// Remember a best guess, unless a final cover is already known.
    pub async fn put_provisional(&self, key: &str, url: impl Into<String>) {
        if self.resolved.contains_key(key) {
            return;
        }
        self.provisional.insert(key.to_string(), url.into()).await;
    }

    pub async fn invalidate_provisional(&self, key: &str) {
        self.provisional.invalidate(key).await;
    }

    /// Drop everything known about `key`.
    pub async fn invalidate(&self, key: &str) {
        self.resolved.invalidate(key).await;
        self.provisional.invalidate(key).await;
    }
}
