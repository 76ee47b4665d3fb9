use folio_storage::StorageBackend;
use folio_storage::error::Result;
use moka::future::Cache;
use std::time::Duration;

/// Short-lived memo of object-store HEAD results.
///
/// Both hits (with the object size) and misses are remembered; failed
/// requests are not.
#[derive(Clone)]
pub struct ExistenceCache {
    sizes: Cache<String, Option<u64>>,
}
impl ExistenceCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            sizes: Cache::builder().name("object-existence").max_capacity(capacity).time_to_live(ttl).build(),
        }
    }

    /// Size of the object under `key`, or `None` if there isn't one.
    pub async fn size(&self, backend: &dyn StorageBackend, key: &str) -> Result<Option<u64>> {
        if let Some(known) = self.sizes.get(key).await {
            return Ok(known);
        }
        let size = backend.head(key).await?.map(|info| info.size);
        self.sizes.insert(key.to_string(), size).await;
        Ok(size)
    }

    /// Record an object that was just written.
    pub async fn mark(&self, key: &str, size: u64) {
        self.sizes.insert(key.to_string(), Some(size)).await;
    }

    pub async fn forget(&self, key: &str) {
        self.sizes.invalidate(key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_storage::backend::MockBackend;

    fn cache() -> ExistenceCache {
        ExistenceCache::new(Duration::from_secs(60), 100)
    }

    #[tokio::test]
    async fn test_hits_and_misses_are_memoised() {
        let backend = MockBackend::with_objects([("covers/a.jpg", b"12345".to_vec())]);
        let cache = cache();
        assert_eq!(cache.size(&backend, "covers/a.jpg").await.unwrap(), Some(5));
        assert_eq!(cache.size(&backend, "covers/a.jpg").await.unwrap(), Some(5));
        assert_eq!(cache.size(&backend, "covers/b.jpg").await.unwrap(), None);
        assert_eq!(cache.size(&backend, "covers/b.jpg").await.unwrap(), None);
        assert_eq!(backend.head_count(), 2);
    }

    #[tokio::test]
    async fn test_mark_overrides_cached_miss() {
        let backend = MockBackend::default();
        let cache = cache();
        assert_eq!(cache.size(&backend, "covers/a.jpg").await.unwrap(), None);
        cache.mark("covers/a.jpg", 42).await;
        assert_eq!(cache.size(&backend, "covers/a.jpg").await.unwrap(), Some(42));
        assert_eq!(backend.head_count(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let backend = MockBackend::default();
        backend.set_fail_heads(true);
        let cache = cache();
        assert!(cache.size(&backend, "covers/a.jpg").await.is_err());
        backend.set_fail_heads(false);
        assert_eq!(cache.size(&backend, "covers/a.jpg").await.unwrap(), None);
        assert_eq!(backend.head_count(), 2);
    }
}
