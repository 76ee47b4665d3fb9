use super::{CoverCandidate, CoverSource, StorageLocation};
use serde::{Deserialize, Serialize};

/// The cover chosen for a book, as held in the final cache and mirrored to the
/// canonical cover record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCover {
    pub url: String,
    pub source: CoverSource,
    pub location: StorageLocation,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub high_resolution: bool,
    pub storage_key: Option<String>,
}
impl ResolvedCover {
    /// Resolve to the configured placeholder image.
    pub fn placeholder(path: impl Into<String>) -> Self {
        Self {
            url: path.into(),
            source: CoverSource::Unknown("placeholder".to_string()),
            location: StorageLocation::Local,
            width: None,
            height: None,
            high_resolution: false,
            storage_key: None,
        }
    }

    /// Adopt a candidate, flagging it high resolution when it reaches
    /// `high_resolution_pixels` unless the source already said otherwise.
    pub fn from_candidate(candidate: CoverCandidate, high_resolution_pixels: u64) -> Self {
        let computed = candidate.pixels() > 0 && candidate.pixels() >= high_resolution_pixels;
        Self {
            high_resolution: candidate.high_resolution.unwrap_or(computed),
            url: candidate.url,
            source: candidate.source,
            location: candidate.location,
            width: candidate.width,
            height: candidate.height,
            storage_key: candidate.storage_key,
        }
    }

    pub fn is_placeholder(&self, placeholder: &str) -> bool {
        self.url == placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_candidate_flags_high_resolution() {
        let big = CoverCandidate::external("https://x/big.jpg", CoverSource::OpenLibrary).with_dimensions(800, 1200);
        assert!(ResolvedCover::from_candidate(big, 320_000).high_resolution);
        let small = CoverCandidate::external("https://x/small.jpg", CoverSource::OpenLibrary).with_dimensions(400, 600);
        assert!(!ResolvedCover::from_candidate(small, 320_000).high_resolution);
    }

    #[test]
    fn test_from_candidate_unknown_dimensions_not_high_resolution() {
        let candidate = CoverCandidate::external("https://x/y.jpg", CoverSource::Longitood);
        assert!(!ResolvedCover::from_candidate(candidate, 0).high_resolution);
    }

    #[test]
    fn test_source_flag_wins() {
        let candidate = CoverCandidate::external("https://x/y.jpg", CoverSource::GoogleBooks)
            .with_dimensions(10, 10)
            .with_high_resolution(true);
        assert!(ResolvedCover::from_candidate(candidate, 320_000).high_resolution);
    }

    #[test]
    fn test_placeholder() {
        let placeholder = ResolvedCover::placeholder("/images/placeholder.svg");
        assert!(placeholder.is_placeholder("/images/placeholder.svg"));
        assert!(!placeholder.high_resolution);
    }
}
