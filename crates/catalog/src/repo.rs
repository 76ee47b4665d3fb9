//! Repository for canonical cover links.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{CANONICAL, CoverLink, CoverRow};
use async_trait::async_trait;
use exn::ResultExt;
use folio_cover::SelectionPolicy;
use sqlx::SqlitePool;
use tracing::instrument;

/// The slice of the catalog the cover pipeline writes through.
#[async_trait]
pub trait CoverStore: Send + Sync {
    /// Insert or replace the link for `(book_id, image_type)`. A link without
    /// a storage key keeps the one already recorded.
    async fn upsert(&self, link: &CoverLink) -> Result<()>;

    async fn get_canonical(&self, book_id: &str) -> Result<Option<CoverLink>>;
}

/// Repository for reading and writing cover links in the catalog database.
///
/// In dry-run mode every write is logged and skipped; reads still go to the
/// database.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            dry_run: false,
        }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    // =========================================================================
    // Insert
    // =========================================================================

    #[instrument(skip_all, fields(book_id = %link.book_id, image_type = %link.image_type))]
    pub async fn upsert(&self, link: &CoverLink) -> Result<()> {
        if link.book_id.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidData("book id"));
        }
        if self.dry_run {
            tracing::info!(url = %link.url, "Skipping cover link upsert during dry run");
            return Ok(());
        }
        let row = CoverRow::from(link);
        sqlx::query(include_str!("../queries/upsert_link.sql"))
            .bind(row.book_id)
            .bind(row.image_type)
            .bind(row.url)
            .bind(row.source)
            .bind(row.storage_location)
            .bind(row.width)
            .bind(row.height)
            .bind(row.is_high_resolution)
            .bind(row.storage_key)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    pub async fn get(&self, book_id: &str, image_type: &str) -> Result<Option<CoverLink>> {
        let row: Option<CoverRow> = sqlx::query_as(include_str!("../queries/get_link.sql"))
            .bind(book_id)
            .bind(image_type)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(CoverLink::try_from).transpose()
    }

    pub async fn get_canonical(&self, book_id: &str) -> Result<Option<CoverLink>> {
        self.get(book_id, CANONICAL).await
    }

    /// Every link for a book, best first according to `policy`.
    pub async fn list_for_book(&self, book_id: &str, policy: &SelectionPolicy) -> Result<Vec<CoverLink>> {
        let rows: Vec<CoverRow> = sqlx::query_as(include_str!("../queries/list_links_for_book.sql"))
            .bind(book_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut links = rows.into_iter().map(CoverLink::try_from).collect::<Result<Vec<_>>>()?;
        policy.sort(&mut links);
        Ok(links)
    }
}

#[async_trait]
impl CoverStore for Repository {
    async fn upsert(&self, link: &CoverLink) -> Result<()> {
        Repository::upsert(self, link).await
    }

    async fn get_canonical(&self, book_id: &str) -> Result<Option<CoverLink>> {
        Repository::get_canonical(self, book_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_config::SelectionConfig;
    use folio_cover::{CoverCandidate, CoverSource, ResolvedCover};
    use rstest::rstest;

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    fn durable_cover(key: Option<&str>, width: u32, height: u32) -> ResolvedCover {
        let mut candidate = CoverCandidate::durable(
            format!("https://cdn.example.com/{}", key.unwrap_or("none")),
            CoverSource::GoogleBooks,
            key.unwrap_or_default(),
        )
        .with_dimensions(width, height);
        candidate.storage_key = key.map(str::to_string);
        ResolvedCover::from_candidate(candidate, 320_000)
    }

    #[tokio::test]
    async fn test_persist_then_read_back() {
        let repo = repo().await;
        let cover = durable_cover(Some("images/book-covers/b1-lg-google-books.jpg"), 800, 1200);
        repo.upsert(&CoverLink::canonical("b1", &cover)).await.unwrap();
        let link = repo.get_canonical("b1").await.unwrap().unwrap();
        assert_eq!(link.url, cover.url);
        assert_eq!((link.width, link.height), (Some(800), Some(1200)));
        assert!(link.high_resolution);
        assert_eq!(ResolvedCover::from(link), cover);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = repo().await;
        assert!(repo.get_canonical("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_storage_key_only_when_new_one_is_null() {
        let repo = repo().await;
        let first = durable_cover(Some("images/book-covers/b1-first.jpg"), 400, 600);
        repo.upsert(&CoverLink::canonical("b1", &first)).await.unwrap();

        // A null storage key never clears the stored one.
        let external = ResolvedCover::from_candidate(
            CoverCandidate::external("https://covers.openlibrary.org/b/isbn/1-L.jpg", CoverSource::OpenLibrary)
                .with_dimensions(500, 750),
            320_000,
        );
        repo.upsert(&CoverLink::canonical("b1", &external)).await.unwrap();
        let link = repo.get_canonical("b1").await.unwrap().unwrap();
        assert_eq!(link.url, external.url);
        assert_eq!(link.source, CoverSource::OpenLibrary);
        assert_eq!(link.width, Some(500));
        assert_eq!(link.storage_key.as_deref(), Some("images/book-covers/b1-first.jpg"));

        // A new non-null key replaces it, keeping url and key in step.
        let second = durable_cover(Some("images/book-covers/b1-second.jpg"), 800, 1200);
        repo.upsert(&CoverLink::canonical("b1", &second)).await.unwrap();
        let link = repo.get_canonical("b1").await.unwrap().unwrap();
        assert_eq!(link.storage_key.as_deref(), Some("images/book-covers/b1-second.jpg"));
        assert_eq!(link.url, second.url);
    }

    #[tokio::test]
    async fn test_storage_key_filled_when_previously_null() {
        let repo = repo().await;
        repo.upsert(&CoverLink::canonical("b1", &durable_cover(None, 400, 600))).await.unwrap();
        repo.upsert(&CoverLink::canonical("b1", &durable_cover(Some("k.jpg"), 400, 600))).await.unwrap();
        let link = repo.get_canonical("b1").await.unwrap().unwrap();
        assert_eq!(link.storage_key.as_deref(), Some("k.jpg"));
    }

    #[tokio::test]
    async fn test_list_for_book_uses_selection_order() {
        let repo = repo().await;
        let policy = SelectionPolicy::new(&SelectionConfig::default());
        let external = ResolvedCover::from_candidate(
            CoverCandidate::external("https://books.google.com/big.jpg", CoverSource::GoogleBooks)
                .with_dimensions(1200, 1800),
            320_000,
        );
        let durable = durable_cover(Some("images/book-covers/b1.jpg"), 400, 600);
        repo.upsert(&CoverLink::new("b1", "alternate", &external)).await.unwrap();
        repo.upsert(&CoverLink::canonical("b1", &durable)).await.unwrap();
        repo.upsert(&CoverLink::canonical("other", &external)).await.unwrap();
        let links = repo.list_for_book("b1", &policy).await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, durable.url);
        assert_eq!(links[1].url, external.url);
    }

    #[rstest]
    #[case::empty(false)]
    #[case::existing(true)]
    #[tokio::test]
    async fn test_dry_run_skips_writes(#[case] existing: bool) {
        let db = Database::connect_in_memory().await.unwrap();
        let live = Repository::from(&db);
        let dry = Repository::new(db.pool().clone(), true);
        let old = durable_cover(Some("old.jpg"), 400, 600);
        if existing {
            live.upsert(&CoverLink::canonical("b1", &old)).await.unwrap();
        }
        dry.upsert(&CoverLink::canonical("b1", &durable_cover(Some("new.jpg"), 800, 1200))).await.unwrap();
        let stored = dry.get_canonical("b1").await.unwrap();
        assert_eq!(stored.and_then(|link| link.storage_key), existing.then(|| "old.jpg".to_string()));
    }

    #[tokio::test]
    async fn test_blank_book_id_rejected() {
        let repo = repo().await;
        let err = repo.upsert(&CoverLink::canonical(" ", &durable_cover(None, 1, 1))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("book id")));
    }

    #[tokio::test]
    async fn test_concurrent_upserts_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("catalog.sqlite")).await.unwrap();
        let repo = Repository::from(&db);
        let mut handles = Vec::new();
        for i in 0..8u32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let cover = durable_cover(Some(&format!("k{i}.jpg")), 400 + i, 600 + i);
                repo.upsert(&CoverLink::canonical("b1", &cover)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let link = repo.get_canonical("b1").await.unwrap().unwrap();
        // Whichever write landed last, its key and dimensions arrived together.
        let i = link.width.unwrap() - 400;
        assert_eq!(link.storage_key, Some(format!("k{i}.jpg")));
    }
}
