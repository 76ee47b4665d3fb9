//! Concrete external cover providers.

mod google;
mod longitood;
mod openlibrary;

pub use self::google::{GoogleBooks, clean_image_url};
pub use self::longitood::Longitood;
pub use self::openlibrary::OpenLibrary;
use crate::guard::KnownBad;
use crate::http::HttpClient;
use crate::provider::{FetcherHandle, GuardedFetcher};
use folio_config::{GOOGLE_BOOKS, LONGITOOD, OPEN_LIBRARY, ProvidersConfig};
use std::sync::Arc;

/// Build a guarded fetcher for every enabled provider in `config`.
///
/// Unknown provider names are logged and ignored.
pub fn configured(config: &ProvidersConfig, http: Arc<dyn HttpClient>, known_bad: &KnownBad) -> Vec<FetcherHandle> {
    let mut fetchers: Vec<FetcherHandle> = Vec::new();
    for (name, provider) in config {
        if !provider.enabled {
            tracing::debug!(provider = %name, "Provider disabled");
            continue;
        }
        let base_url = provider.base_url.as_deref();
        let http = http.clone();
        let known_bad = known_bad.clone();
        let fetcher: FetcherHandle = match name.as_str() {
            GOOGLE_BOOKS => Arc::new(GuardedFetcher::new(GoogleBooks::new(base_url), http, known_bad, provider)),
            OPEN_LIBRARY => Arc::new(GuardedFetcher::new(OpenLibrary::new(base_url), http, known_bad, provider)),
            LONGITOOD => Arc::new(GuardedFetcher::new(Longitood::new(base_url), http, known_bad, provider)),
            other => {
                tracing::warn!(provider = %other, "Unknown cover provider in configuration, ignoring");
                continue;
            },
        };
        fetchers.push(fetcher);
    }
    fetchers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::FakeHttp;
    use folio_config::{Configuration, ProviderConfig};
    use folio_cover::CoverSource;
    use std::time::Duration;

    #[test]
    fn test_defaults_build_every_provider() {
        let config = Configuration::default();
        let known_bad = KnownBad::new(Duration::from_secs(60), 10);
        let fetchers = configured(&config.providers, Arc::new(FakeHttp::default()), &known_bad);
        let sources: Vec<CoverSource> = fetchers.iter().map(|f| f.source()).collect();
        assert_eq!(sources.len(), 3);
        assert!(sources.contains(&CoverSource::GoogleBooks));
        assert!(sources.contains(&CoverSource::OpenLibrary));
        assert!(sources.contains(&CoverSource::Longitood));
    }

    #[test]
    fn test_disabled_and_unknown_are_skipped() {
        let mut providers = ProvidersConfig::new();
        providers.insert(
            GOOGLE_BOOKS.to_string(),
            ProviderConfig {
                enabled: false,
                ..ProviderConfig::default()
            },
        );
        providers.insert("amazon".to_string(), ProviderConfig::default());
        providers.insert(LONGITOOD.to_string(), ProviderConfig::default());
        let known_bad = KnownBad::new(Duration::from_secs(60), 10);
        let fetchers = configured(&providers, Arc::new(FakeHttp::default()), &known_bad);
        assert_eq!(fetchers.len(), 1);
        assert_eq!(fetchers[0].source(), CoverSource::Longitood);
    }
}
