use crate::provider::ProviderApi;
use folio_cover::{CoverCandidate, CoverSource};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://bookcover.longitood.com";

pub struct Longitood {
    base_url: String,
}
impl Longitood {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
        }
    }
}

impl ProviderApi for Longitood {
    fn source(&self) -> CoverSource {
        CoverSource::Longitood
    }

    fn request_url(&self, id: &str) -> String {
        format!("{}/bookcover/{id}", self.base_url)
    }

    fn extract(&self, _id: &str, body: &Value) -> Option<CoverCandidate> {
        body["url"]
            .as_str()
            .map(str::trim)
            .filter(|url| url.starts_with("http"))
            .map(|url| CoverCandidate::external(url, self.source()))
    }
}
