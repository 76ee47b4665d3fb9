//! Audit trail of a single resolution run.
//!
//! Every source that is tried, and every step of the upload pipeline, appends
//! an [`Attempt`]. The record is logged once at the end of the run and is not
//! persisted anywhere.

use crate::models::{CoverSource, ResolvedCover, StorageLocation};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    NotFound,
    /// Short-circuited before any I/O (known-bad, rate limited, circuit open).
    Skipped,
    Timeout,
    Failed,
}
impl Display for AttemptStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::Skipped => "skipped",
            Self::Timeout => "timeout",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub source: CoverSource,
    pub url_attempted: Option<String>,
    pub status: AttemptStatus,
    pub failure_reason: Option<String>,
    /// What a successful step did, e.g. `downloaded` or `reused existing object`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
impl Attempt {
    pub fn success(source: CoverSource, url: impl Into<String>) -> Self {
        Self {
            source,
            url_attempted: Some(url.into()),
            status: AttemptStatus::Success,
            failure_reason: None,
            detail: None,
        }
    }

    pub fn failed(source: CoverSource, url: Option<String>, status: AttemptStatus, reason: impl Display) -> Self {
        Self {
            source,
            url_attempted: url,
            status,
            failure_reason: Some(reason.to_string()),
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selected {
    pub source: CoverSource,
    pub final_url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub storage_location: StorageLocation,
    pub selection_reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub book_id: String,
    pub attempts: Vec<Attempt>,
    pub selected: Option<Selected>,
}
impl Provenance {
    pub fn new(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            attempts: Vec::new(),
            selected: None,
        }
    }

    pub fn push(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }

    pub fn record(
        &mut self,
        source: CoverSource,
        url_attempted: Option<&str>,
        status: AttemptStatus,
        failure_reason: Option<String>,
    ) {
        self.attempts.push(Attempt {
            source,
            url_attempted: url_attempted.map(str::to_string),
            status,
            failure_reason,
            detail: None,
        });
    }

    /// Record a successful intermediate step.
    pub fn step(&mut self, source: CoverSource, url: Option<&str>, detail: impl Into<String>) {
        self.attempts.push(Attempt {
            source,
            url_attempted: url.map(str::to_string),
            status: AttemptStatus::Success,
            failure_reason: None,
            detail: Some(detail.into()),
        });
    }

    pub fn success(&mut self, source: CoverSource, url: &str) {
        self.record(source, Some(url), AttemptStatus::Success, None);
    }

    pub fn failure(&mut self, source: CoverSource, url: Option<&str>, status: AttemptStatus, reason: impl Display) {
        self.record(source, url, status, Some(reason.to_string()));
    }

    pub fn select(&mut self, cover: &ResolvedCover, reason: impl Into<String>) {
        self.selected = Some(Selected {
            source: cover.source.clone(),
            final_url: cover.url.clone(),
            width: cover.width,
            height: cover.height,
            storage_location: cover.location,
            selection_reason: reason.into(),
        });
    }

    /// Emit the whole record as a single event.
    pub fn log(&self) {
        let successes = self.attempts.iter().filter(|a| a.status == AttemptStatus::Success).count();
        match serde_json::to_string(self) {
            Ok(record) => tracing::info!(
                book_id = %self.book_id,
                attempts = self.attempts.len(),
                successes,
                selected = self.selected.as_ref().map(|s| s.final_url.as_str()),
                record = %record,
                "Cover resolution provenance"
            ),
            Err(err) => tracing::warn!(book_id = %self.book_id, error = %err, "Could not serialize cover provenance"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut provenance = Provenance::new("9780134685991");
        provenance.failure(CoverSource::OpenLibrary, None, AttemptStatus::Skipped, "circuit open");
        provenance.success(CoverSource::GoogleBooks, "https://books.google.com/x.jpg");
        assert_eq!(provenance.attempts.len(), 2);
        assert_eq!(provenance.attempts[0].status, AttemptStatus::Skipped);
        assert_eq!(provenance.attempts[0].failure_reason.as_deref(), Some("circuit open"));
        assert_eq!(provenance.attempts[1].url_attempted.as_deref(), Some("https://books.google.com/x.jpg"));
    }

    #[test]
    fn test_step_detail() {
        let mut provenance = Provenance::new("b1");
        provenance.step(CoverSource::GoogleBooks, None, "reused existing object");
        let attempt = &provenance.attempts[0];
        assert_eq!(attempt.status, AttemptStatus::Success);
        assert_eq!(attempt.failure_reason, None);
        assert_eq!(attempt.detail.as_deref(), Some("reused existing object"));
        let json = serde_json::to_value(&provenance).unwrap();
        assert_eq!(json["attempts"][0]["detail"], "reused existing object");
    }

    #[test]
    fn test_select_and_serialize() {
        let mut provenance = Provenance::new("b1");
        let cover = ResolvedCover::placeholder("/placeholder.svg");
        provenance.select(&cover, "no candidates");
        let json = serde_json::to_value(&provenance).unwrap();
        assert_eq!(json["selected"]["final_url"], "/placeholder.svg");
        assert_eq!(json["selected"]["selection_reason"], "no candidates");
        assert_eq!(json["selected"]["storage_location"], "local");
        // Logging without a subscriber is a no-op.
        provenance.log();
    }
}
