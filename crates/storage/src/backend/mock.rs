//! In-memory storage backend for testing.

use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use crate::{ObjectInfo, ObjectMeta, StorageBackend};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;

struct Entry {
    modified: OffsetDateTime,
    data: Vec<u8>,
    meta: ObjectMeta,
}

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Every call is
/// counted, so tests can assert that a code path did (or did not) touch
/// storage.
///
/// # Examples
///
/// ```
/// use folio_storage::backend::MockBackend;
/// use folio_storage::{ObjectMeta, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_objects([
///     ("images/book-covers/b1.jpg", b"jpeg".to_vec()),
/// ]);
/// assert!(backend.exists("images/book-covers/b1.jpg").await?);
///
/// backend.put("images/book-covers/b2.jpg", b"data", &ObjectMeta::new("image/jpeg")).await?;
/// assert_eq!(backend.put_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<String, Entry>>,
    heads: AtomicUsize,
    gets: AtomicUsize,
    puts: AtomicUsize,
    head_delay_ms: AtomicU64,
    fail_puts: AtomicBool,
    fail_heads: AtomicBool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any key fails validation (e.g. traversal). If test setup is
    /// wrong, then test should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (key, data) in objects {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected.
                panic!("MockBackend::with_objects: invalid key {key}");
            };
            map.insert(
                validated,
                Entry {
                    modified: OffsetDateTime::now_utc(),
                    data: data.into(),
                    meta: ObjectMeta::default(),
                },
            );
        }
        Self {
            storage: RwLock::new(map),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(HashMap::new()),
            heads: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            head_delay_ms: AtomicU64::new(0),
            fail_puts: AtomicBool::new(false),
            fail_heads: AtomicBool::new(false),
        }
    }

    /// Insert an object with metadata, bypassing the call counters.
    pub async fn insert(&self, key: &str, data: impl Into<Vec<u8>>, meta: ObjectMeta) {
        let Ok(validated) = validate_key(key) else {
            panic!("MockBackend::insert: invalid key {key}");
        };
        self.storage.write().await.insert(
            validated,
            Entry {
                modified: OffsetDateTime::now_utc(),
                data: data.into(),
                meta,
            },
        );
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every `head` call sleep first.
    pub fn set_head_delay(&self, delay: Duration) {
        self.head_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make every `put` call fail with a network error.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every `head` call fail with a network error.
    pub fn set_fail_heads(&self, fail: bool) {
        self.fail_heads.store(fail, Ordering::SeqCst);
    }

    pub fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.storage.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        let key = validate_key(key)?;
        let delay = self.head_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_heads.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network("mock head failure".to_string()));
        }
        let guard = self.storage.read().await;
        Ok(guard.get(&key).map(|entry| {
            ObjectInfo::new(key.clone(), entry.data.len() as u64, entry.meta.clone()).with_modified(entry.modified)
        }))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let key = validate_key(key)?;
        let guard = self.storage.read().await;
        let entry = guard.get(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        Ok(entry.data.clone())
    }

    async fn put(&self, key: &str, data: &[u8], meta: &ObjectMeta) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let key = validate_key(key)?;
        if self.fail_puts.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network("mock put failure".to_string()));
        }
        self.storage.write().await.insert(
            key,
            Entry {
                modified: OffsetDateTime::now_utc(),
                data: data.to_vec(),
                meta: meta.clone(),
            },
        );
        Ok(())
    }
}
