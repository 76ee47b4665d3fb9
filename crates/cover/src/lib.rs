//! Domain types for book cover resolution.
//!
//! This crate is pure: no I/O happens here. It knows how to derive a stable
//! key for a book, how to rank competing cover candidates, what storage keys a
//! cover may live under, and how to record what was tried along the way.

pub mod error;
pub mod identifier;
pub mod keys;
pub mod models;
pub mod provenance;
pub mod select;

pub use crate::identifier::{BookKey, IdentifierKind};
pub use crate::models::{Book, CoverCandidate, CoverSource, ResolvedCover, StorageLocation};
pub use crate::provenance::{Attempt, AttemptStatus, Provenance};
pub use crate::select::{Ranked, Selection, SelectionPolicy};
