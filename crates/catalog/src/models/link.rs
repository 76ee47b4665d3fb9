use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use folio_cover::{CoverSource, Ranked, ResolvedCover, StorageLocation};
use time::UtcDateTime;

/// Image variant holding the cover currently served for a book.
pub const CANONICAL: &str = "canonical";

/// A cover recorded for one `(book, image_type)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverLink {
    pub book_id: String,
    pub image_type: String,
    pub url: String,
    pub source: CoverSource,
    pub location: StorageLocation,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub high_resolution: bool,
    pub storage_key: Option<String>,
    pub updated_at: UtcDateTime,
}
impl CoverLink {
    /// The canonical link for a resolved cover.
    pub fn canonical(book_id: impl Into<String>, cover: &ResolvedCover) -> Self {
        Self::new(book_id, CANONICAL, cover)
    }

    pub fn new(book_id: impl Into<String>, image_type: impl Into<String>, cover: &ResolvedCover) -> Self {
        Self {
            book_id: book_id.into(),
            image_type: image_type.into(),
            url: cover.url.clone(),
            source: cover.source.clone(),
            location: cover.location,
            width: cover.width,
            height: cover.height,
            high_resolution: cover.high_resolution,
            storage_key: cover.storage_key.clone(),
            updated_at: UtcDateTime::now(),
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.image_type == CANONICAL
    }
}
impl From<CoverLink> for ResolvedCover {
    fn from(link: CoverLink) -> Self {
        Self {
            url: link.url,
            source: link.source,
            location: link.location,
            width: link.width,
            height: link.height,
            high_resolution: link.high_resolution,
            storage_key: link.storage_key,
        }
    }
}
impl Ranked for CoverLink {
    fn location(&self) -> StorageLocation {
        self.location
    }

    fn pixels(&self) -> u64 {
        match (self.width, self.height) {
            (Some(w), Some(h)) => u64::from(w) * u64::from(h),
            _ => 0,
        }
    }

    fn source_name(&self) -> &str {
        self.source.as_str()
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CoverRow {
    pub(crate) book_id: String,
    pub(crate) image_type: String,
    pub(crate) url: String,
    pub(crate) source: String,
    pub(crate) storage_location: String,
    pub(crate) width: Option<i64>,
    pub(crate) height: Option<i64>,
    pub(crate) is_high_resolution: bool,
    pub(crate) storage_key: Option<String>,
    pub(crate) updated_at: i64,
}
impl From<&CoverLink> for CoverRow {
    fn from(link: &CoverLink) -> Self {
        Self {
            book_id: link.book_id.clone(),
            image_type: link.image_type.clone(),
            url: link.url.clone(),
            source: link.source.to_string(),
            storage_location: link.location.to_string(),
            width: link.width.map(i64::from),
            height: link.height.map(i64::from),
            is_high_resolution: link.high_resolution,
            storage_key: link.storage_key.clone(),
            updated_at: link.updated_at.unix_timestamp(),
        }
    }
}
impl TryFrom<CoverRow> for CoverLink {
    type Error = Error;
    fn try_from(row: CoverRow) -> Result<Self, Self::Error> {
        let dimension = |value: Option<i64>| {
            value.map(u32::try_from).transpose().or_raise(|| ErrorKind::InvalidData("image dimension"))
        };
        Ok(Self {
            book_id: row.book_id,
            image_type: row.image_type,
            url: row.url,
            source: CoverSource::from(row.source),
            location: row
                .storage_location
                .parse::<StorageLocation>()
                .or_raise(|| ErrorKind::InvalidData("storage location"))?,
            width: dimension(row.width)?,
            height: dimension(row.height)?,
            high_resolution: row.is_high_resolution,
            storage_key: row.storage_key,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("update timestamp"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> CoverRow {
        CoverRow {
            book_id: "9780134685991".to_string(),
            image_type: CANONICAL.to_string(),
            url: "https://cdn.example.com/images/book-covers/9780134685991-lg-google-books.jpg".to_string(),
            source: "google-books".to_string(),
            storage_location: "durable".to_string(),
            width: Some(800),
            height: Some(1200),
            is_high_resolution: true,
            storage_key: Some("images/book-covers/9780134685991-lg-google-books.jpg".to_string()),
            updated_at: 1_760_000_000,
        }
    }

    #[test]
    fn test_row_to_model() {
        let link = CoverLink::try_from(row()).unwrap();
        assert_eq!(link.source, CoverSource::GoogleBooks);
        assert_eq!(link.location, StorageLocation::Durable);
        assert_eq!(link.width, Some(800));
        assert!(link.is_canonical());
        assert_eq!(link.pixels(), 960_000);
    }

    #[test]
    fn test_negative_dimension_is_invalid() {
        let mut row = row();
        row.width = Some(-1);
        let err = CoverLink::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("image dimension")));
    }

    #[test]
    fn test_unknown_location_is_invalid() {
        let mut row = row();
        row.storage_location = "tape".to_string();
        assert!(CoverLink::try_from(row).is_err());
    }

    #[test]
    fn test_model_to_row() {
        let cover = ResolvedCover::placeholder("/placeholder.svg");
        let link = CoverLink::canonical("b1", &cover);
        let row = CoverRow::from(&link);
        assert_eq!(row.source, "placeholder");
        assert_eq!(row.storage_location, "local");
        assert_eq!(row.width, None);
        assert_eq!(row.updated_at, link.updated_at.unix_timestamp());
    }
}
