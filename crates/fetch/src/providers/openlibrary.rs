use crate::provider::ProviderApi;
use folio_cover::{CoverCandidate, CoverSource};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://openlibrary.org";

const COVER_SIZES: [&str; 3] = ["large", "medium", "small"];

pub struct OpenLibrary {
    base_url: String,
}
impl OpenLibrary {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
        }
    }
}

impl ProviderApi for OpenLibrary {
    fn source(&self) -> CoverSource {
        CoverSource::OpenLibrary
    }

    fn request_url(&self, id: &str) -> String {
        format!("{}/api/books?bibkeys=ISBN:{id}&format=json&jscmd=data", self.base_url)
    }

    /// The response is keyed by the requested bibkey; an unknown ISBN comes
    /// back as an empty object.
    fn extract(&self, id: &str, body: &Value) -> Option<CoverCandidate> {
        let record = &body[format!("ISBN:{id}").as_str()];
        let cover = &record["cover"];
        let url = COVER_SIZES
            .iter()
            .find_map(|size| cover[*size].as_str().map(str::trim).filter(|u| !u.is_empty()))?;
        let candidate = CoverCandidate::external(url, self.source());
        Some(match record["key"].as_str() {
            Some(key) => candidate.with_source_system_id(key),
            None => candidate,
        })
    }
}
