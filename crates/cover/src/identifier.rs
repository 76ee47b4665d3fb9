//! Stable cache keys for books.

use crate::error::{ErrorKind, Result};
use crate::models::Book;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Which identifier a [`BookKey`] was derived from, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentifierKind {
    Isbn13,
    Isbn10,
    External,
    Internal,
}

/// Key under which everything about one book's cover is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookKey {
    kind: IdentifierKind,
    value: String,
}
impl BookKey {
    /// Derive the key for a book, preferring ISBN-13, then ISBN-10, then the
    /// external identifier, then the internal id.
    pub fn resolve(book: &Book) -> Result<Self> {
        if let Some(isbn) = book.isbn13.as_deref().and_then(normalize_isbn13) {
            return Ok(Self::new(IdentifierKind::Isbn13, isbn));
        }
        if let Some(isbn) = book.isbn10.as_deref().and_then(normalize_isbn10) {
            return Ok(Self::new(IdentifierKind::Isbn10, isbn));
        }
        if let Some(id) = non_blank(book.external_id.as_deref()) {
            return Ok(Self::new(IdentifierKind::External, id));
        }
        if let Some(id) = non_blank(Some(&book.id)) {
            return Ok(Self::new(IdentifierKind::Internal, id));
        }
        exn::bail!(ErrorKind::NoIdentifier)
    }

    fn new(kind: IdentifierKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_isbn(&self) -> bool {
        matches!(self.kind, IdentifierKind::Isbn13 | IdentifierKind::Isbn10)
    }
}
impl Display for BookKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.value)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Strip separators from an ISBN-13, returning `None` unless exactly 13 digits
/// remain.
pub fn normalize_isbn13(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (digits.len() == 13).then_some(digits)
}

/// Strip separators from an ISBN-10. The check digit may be `X`, which is kept
/// (uppercased) in the final position.
pub fn normalize_isbn10(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(10);
    for c in raw.trim().chars() {
        match c {
            '0'..='9' => out.push(c),
            'x' | 'X' if out.len() == 9 => out.push('X'),
            '-' | ' ' => {},
            _ => return None,
        }
    }
    (out.len() == 10).then_some(out)
}

/// Best ISBN a provider can be queried with, ISBN-13 first.
pub fn preferred_isbn(book: &Book) -> Option<String> {
    book.isbn13
        .as_deref()
        .and_then(normalize_isbn13)
        .or_else(|| book.isbn10.as_deref().and_then(normalize_isbn10))
}
