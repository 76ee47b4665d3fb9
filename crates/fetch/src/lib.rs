//! Cover sources.
//!
//! Every source, external provider or durable object store, implements
//! [`CoverFetcher`]. External providers are wrapped in a [`GuardedFetcher`]
//! that applies the known-bad registry, a rate limiter and (optionally) a
//! circuit breaker before any request leaves the process.

pub mod error;
pub mod guard;
pub mod http;
pub mod net;
pub mod provider;
pub mod providers;
mod store;

pub use crate::guard::KnownBad;
pub use crate::http::{Download, HttpClient, ReqwestClient};
pub use crate::provider::{CoverFetcher, Fetch, FetcherHandle, GuardedFetcher, ProviderApi};
pub use crate::store::ObjectStoreFetcher;
