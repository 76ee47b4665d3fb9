use super::slugify;
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Where a cover came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum CoverSource {
    GoogleBooks,
    OpenLibrary,
    Longitood,
    /// Found already sitting in durable object storage.
    ObjectStore,
    /// Found in a local (on-disk) cache.
    LocalCache,
    /// Placeholder or otherwise unattributed.
    Unknown(String),
}
impl CoverSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GoogleBooks => folio_config::GOOGLE_BOOKS,
            Self::OpenLibrary => folio_config::OPEN_LIBRARY,
            Self::Longitood => folio_config::LONGITOOD,
            Self::ObjectStore => "object-store",
            Self::LocalCache => "local-cache",
            Self::Unknown(name) => name,
        }
    }

    /// Name safe to embed in a storage key.
    pub fn key_segment(&self) -> String {
        match slugify(self.as_str()) {
            s if s.is_empty() => "unknown".to_string(),
            s => s,
        }
    }
}
impl FromStr for CoverSource {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match slugify(s).as_str() {
            "google-books" | "googlebooks" | "google" => Self::GoogleBooks,
            "open-library" | "openlibrary" => Self::OpenLibrary,
            "longitood" => Self::Longitood,
            "object-store" | "s3" | "s3-cache" => Self::ObjectStore,
            "local-cache" | "local" => Self::LocalCache,
            _ => Self::Unknown(s.trim().to_string()),
        })
    }
}
impl From<String> for CoverSource {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(source) => source,
            Err(never) => match never {},
        }
    }
}
impl From<CoverSource> for String {
    fn from(value: CoverSource) -> Self {
        value.as_str().to_string()
    }
}
impl Display for CoverSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("google-books", CoverSource::GoogleBooks)]
    #[case("Google Books", CoverSource::GoogleBooks)]
    #[case("OPEN_LIBRARY", CoverSource::OpenLibrary)]
    #[case("longitood", CoverSource::Longitood)]
    #[case("S3", CoverSource::ObjectStore)]
    #[case("local", CoverSource::LocalCache)]
    #[case("Some Vendor", CoverSource::Unknown("Some Vendor".to_string()))]
    fn test_parse(#[case] input: &str, #[case] expected: CoverSource) {
        assert_eq!(input.parse::<CoverSource>().unwrap(), expected);
    }

    #[test]
    fn test_display_round_trips_known_sources() {
        for source in [CoverSource::GoogleBooks, CoverSource::OpenLibrary, CoverSource::ObjectStore] {
            assert_eq!(source.to_string().parse::<CoverSource>().unwrap(), source);
        }
    }

    #[test]
    fn test_key_segment() {
        assert_eq!(CoverSource::Unknown("Some Vendor!".to_string()).key_segment(), "some-vendor");
        assert_eq!(CoverSource::Unknown("!!".to_string()).key_segment(), "unknown");
    }
}
