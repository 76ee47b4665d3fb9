use folio_cover::CoverSource;
use moka::future::Cache;
use std::time::Duration;

/// Identifiers a provider recently had nothing for.
///
/// Asking again before the entry expires would only burn rate-limit budget,
/// so fetchers skip them. Cloning shares the underlying cache.
#[derive(Clone)]
pub struct KnownBad {
    cache: Cache<(CoverSource, String), ()>,
}
impl KnownBad {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(capacity).time_to_live(ttl).build();
        Self { cache }
    }

    pub async fn contains(&self, source: &CoverSource, id: &str) -> bool {
        self.cache.get(&(source.clone(), id.to_string())).await.is_some()
    }

    pub async fn mark(&self, source: &CoverSource, id: &str) {
        tracing::debug!(source = %source, id, "Marking identifier as known-bad");
        self.cache.insert((source.clone(), id.to_string()), ()).await;
    }
}
