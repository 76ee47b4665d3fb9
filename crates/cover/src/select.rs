//! Candidate ranking.
//!
//! Candidates are filtered (missing, placeholder, or too small) and then
//! ordered best first by:
//!
//! 1. durably stored before anything else,
//! 2. pixel count, descending,
//! 3. storage tier: local, durable, external,
//! 4. provider rank from the configured list, unlisted providers last.
//!
//! The sort is stable, so candidates that tie on every step keep their input
//! order. The same ordering is used wherever covers for a book are listed.

use crate::models::{CoverCandidate, StorageLocation, slugify};
use folio_config::SelectionConfig;
use std::cmp::Ordering;

/// Anything that can be ranked against other covers.
pub trait Ranked {
    fn location(&self) -> StorageLocation;
    fn pixels(&self) -> u64;
    fn source_name(&self) -> &str;
}
impl Ranked for CoverCandidate {
    fn location(&self) -> StorageLocation {
        self.location
    }

    fn pixels(&self) -> u64 {
        CoverCandidate::pixels(self)
    }

    fn source_name(&self) -> &str {
        self.source.as_str()
    }
}
impl<R: Ranked> Ranked for &R {
    fn location(&self) -> StorageLocation {
        (**self).location()
    }

    fn pixels(&self) -> u64 {
        (**self).pixels()
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }
}

/// Outcome of a selection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub best: Option<CoverCandidate>,
    /// Human readable explanation, recorded in provenance.
    pub reason: String,
    pub considered: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    min_width: u32,
    min_height: u32,
    placeholder: String,
    ranking: Vec<String>,
}
impl SelectionPolicy {
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            min_width: config.min_width,
            min_height: config.min_height,
            placeholder: config.placeholder.clone(),
            ranking: config.provider_ranking.iter().map(slugify).collect(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    fn provider_rank(&self, source: &str) -> usize {
        let source = slugify(source);
        self.ranking.iter().position(|r| *r == source).unwrap_or(self.ranking.len())
    }

    /// Ordering where [`Less`](Ordering::Less) means `a` is the better cover.
    pub fn compare<A: Ranked, B: Ranked>(&self, a: &A, b: &B) -> Ordering {
        let a_durable = a.location() == StorageLocation::Durable;
        let b_durable = b.location() == StorageLocation::Durable;
        b_durable
            .cmp(&a_durable)
            .then_with(|| b.pixels().cmp(&a.pixels()))
            .then_with(|| a.location().cmp(&b.location()))
            .then_with(|| self.provider_rank(a.source_name()).cmp(&self.provider_rank(b.source_name())))
    }

    /// Stable sort, best first.
    pub fn sort<R: Ranked>(&self, items: &mut [R]) {
        items.sort_by(|a, b| self.compare(a, b));
    }

    /// Why a candidate can't be used, if it can't.
    pub fn rejection(&self, candidate: &CoverCandidate) -> Option<&'static str> {
        let url = candidate.url.trim();
        if url.is_empty() {
            return Some("empty url");
        }
        if url == self.placeholder {
            return Some("placeholder");
        }
        // Unknown dimensions get the benefit of the doubt.
        if candidate.width.is_some_and(|w| w < self.min_width) || candidate.height.is_some_and(|h| h < self.min_height)
        {
            return Some("below minimum dimensions");
        }
        None
    }

    /// Pick the best usable candidate.
    pub fn select(&self, candidates: impl IntoIterator<Item = Option<CoverCandidate>>) -> Selection {
        let mut considered = 0;
        let mut eligible = Vec::new();
        for candidate in candidates.into_iter().flatten() {
            considered += 1;
            match self.rejection(&candidate) {
                Some(reason) => {
                    tracing::debug!(source = %candidate.source, url = %candidate.url, reason, "Rejected cover candidate");
                },
                None => eligible.push(candidate),
            }
        }
        let rejected = considered - eligible.len();
        self.sort(&mut eligible);
        let best = eligible.into_iter().next();
        let reason = match &best {
            None if considered == 0 => "no candidates".to_string(),
            None => format!("all {considered} candidates rejected"),
            Some(c) => format!(
                "{} {}x{} from {} ({} considered, {} rejected)",
                c.location,
                c.width.map_or_else(|| "?".to_string(), |w| w.to_string()),
                c.height.map_or_else(|| "?".to_string(), |h| h.to_string()),
                c.source,
                considered,
                rejected,
            ),
        };
        Selection {
            best,
            reason,
            considered,
            rejected,
        }
    }
}
