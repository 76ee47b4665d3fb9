use crate::provider::ProviderApi;
use folio_cover::{CoverCandidate, CoverSource};
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// `imageLinks` keys, largest first.
const IMAGE_SIZES: [&str; 6] = ["extraLarge", "large", "medium", "small", "thumbnail", "smallThumbnail"];

pub struct GoogleBooks {
    base_url: String,
}
impl GoogleBooks {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
        }
    }
}

/// Force https and drop the parameters that make Google serve a small,
/// page-curled rendition.
pub fn clean_image_url(raw: &str) -> String {
    let url = match raw.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => raw.to_string(),
    };
    let Some((base, query)) = url.split_once('?') else {
        return url;
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && !pair.starts_with("zoom=") && *pair != "edge=curl")
        .collect();
    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}

impl ProviderApi for GoogleBooks {
    fn source(&self) -> CoverSource {
        CoverSource::GoogleBooks
    }

    fn request_url(&self, id: &str) -> String {
        format!("{}/books/v1/volumes?q=isbn:{id}", self.base_url)
    }

    fn extract(&self, _id: &str, body: &Value) -> Option<CoverCandidate> {
        let volume = body["items"].as_array()?.first()?;
        let links = &volume["volumeInfo"]["imageLinks"];
        let url = IMAGE_SIZES
            .iter()
            .find_map(|size| links[*size].as_str().map(str::trim).filter(|u| !u.is_empty()))?;
        let candidate = CoverCandidate::external(clean_image_url(url), self.source());
        Some(match volume["id"].as_str() {
            Some(volume_id) => candidate.with_source_system_id(volume_id),
            None => candidate,
        })
    }
}
