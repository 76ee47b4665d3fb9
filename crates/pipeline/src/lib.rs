//! Book cover resolution.
//!
//! Given a [`Book`](folio_cover::Book), a [`CoverResolver`] answers with the
//! best cover URL it knows right now and upgrades that answer in the
//! background: it asks the object store and every enabled provider, picks
//! the best candidate, stores it durably, records it in the catalog and
//! publishes a [`CoverUpdated`] event.
//!
//! ```no_run
//! # async fn example() -> folio_pipeline::error::Result<()> {
//! use folio_config::Configuration;
//! use folio_cover::Book;
//! use folio_pipeline::PipelineBuilder;
//!
//! let config = Configuration::default();
//! let resolver = PipelineBuilder::new(config).build()?;
//! let response = resolver.resolve(&Book::new("b1").with_isbn13("9780306406157")).await;
//! println!("{}", response.url);
//! # Ok(())
//! # }
//! ```

mod builder;
pub mod cache;
pub mod error;
pub mod existence;
pub mod notify;
pub mod process;
pub mod resolve;
pub mod upload;

pub use crate::builder::PipelineBuilder;
pub use crate::cache::{CacheHit, CoverCache};
pub use crate::notify::{CoverUpdated, Notifier};
pub use crate::process::{DefaultProcessor, ImageProcessor, ProcessedImage};
pub use crate::resolve::{AnswerOrigin, CoverResolver, CoverResponse, Outcome};
pub use crate::upload::{UploadInput, Uploaded, Uploader};
