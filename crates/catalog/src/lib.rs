//! SQLite catalog of canonical book covers.
//!
//! Each book has at most one row per image variant; the `canonical` variant
//! is the cover currently served. Rows are written only by the cover
//! pipeline's persistence step and are otherwise read-only.
//!
//! Listing covers for a book orders them with the same
//! [`SelectionPolicy`](folio_cover::SelectionPolicy) used for live candidate
//! selection, so query-time and request-time ranking never disagree.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{CANONICAL, CoverLink};
pub use crate::repo::{CoverStore, Repository};
