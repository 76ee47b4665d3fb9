/// The slice of a catalog book record that cover resolution cares about.
///
/// Owned by the catalog service; this crate only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
    /// Internal record identifier.
    pub id: String,
    pub isbn13: Option<String>,
    pub isbn10: Option<String>,
    /// Stable identifier at an external provider (e.g. a Google Books volume id).
    pub external_id: Option<String>,
    /// Cover URL supplied by whichever provider the book was imported from.
    pub external_cover_url: Option<String>,
    /// Public URL of a previously cached cover, if any.
    pub cached_cover_url: Option<String>,
    /// Object-store key of a previously cached cover, if any.
    pub cached_cover_key: Option<String>,
}
impl Book {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_isbn13(mut self, isbn: impl Into<String>) -> Self {
        self.isbn13 = Some(isbn.into());
        self
    }

    pub fn with_isbn10(mut self, isbn: impl Into<String>) -> Self {
        self.isbn10 = Some(isbn.into());
        self
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    pub fn with_external_cover_url(mut self, url: impl Into<String>) -> Self {
        self.external_cover_url = Some(url.into());
        self
    }

    pub fn with_cached_cover(mut self, url: impl Into<String>, key: Option<String>) -> Self {
        self.cached_cover_url = Some(url.into());
        self.cached_cover_key = key;
        self
    }

    /// The book has an external cover but nothing in durable storage yet.
    pub fn needs_migration(&self) -> bool {
        let has_external = self.external_cover_url.as_deref().is_some_and(|u| !u.trim().is_empty());
        let has_durable = self.cached_cover_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        has_external && !has_durable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_migration() {
        let book = Book::new("b1");
        assert!(!book.needs_migration());
        let book = book.with_external_cover_url("https://books.google.com/x.jpg");
        assert!(book.needs_migration());
        let book = book.with_cached_cover("https://cdn/x.jpg", Some("images/book-covers/b1.jpg".to_string()));
        assert!(!book.needs_migration());
    }

    #[test]
    fn test_blank_external_url_is_not_migrated() {
        assert!(!Book::new("b1").with_external_cover_url("  ").needs_migration());
    }
}
