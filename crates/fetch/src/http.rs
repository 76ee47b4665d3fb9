//! Minimal HTTP capability used by providers and the upload pipeline.

use crate::error::{ErrorKind, Result};
use crate::net::{PublicResolver, redirect_allowed};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("folio/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 5;
/// Cap on JSON API responses; provider lookups are tiny.
const MAX_JSON_BYTES: u64 = 2 * 1024 * 1024;

/// Bytes downloaded from a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// GET-only HTTP client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url` and parse the body as JSON.
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value>;

    /// GET `url`, reading at most `max_bytes` of body.
    ///
    /// Redirects are not followed: a 3xx answer is an
    /// [`ErrorKind::Redirect`] carrying the target, so the caller can vet it.
    async fn get_bytes(&self, url: &str, timeout: Duration, max_bytes: u64) -> Result<Download>;
}

/// [`HttpClient`] backed by `reqwest`.
///
/// Both clients resolve names through [`PublicResolver`]. API calls follow
/// https redirects to public hosts; downloads never follow redirects.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    api: reqwest::Client,
    download: reqwest::Client,
}
impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let api_redirects = Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if redirect_allowed(attempt.url()) {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });
        Ok(Self {
            api: Self::builder(api_redirects)?,
            download: Self::builder(Policy::none())?,
        })
    }

    fn builder(redirects: Policy) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirects)
            .dns_resolver(Arc::new(PublicResolver))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| ErrorKind::Network(err.to_string()))?;
        Ok(client)
    }

    fn map_error(err: reqwest::Error, url: &str) -> ErrorKind {
        if err.is_timeout() {
            return ErrorKind::Timeout(url.to_string());
        }
        if let Some(status) = err.status() {
            return ErrorKind::from_status(status.as_u16(), url);
        }
        ErrorKind::Network(format!("{url}: {err}"))
    }

    async fn fetch(client: &reqwest::Client, url: &str, timeout: Duration, max_bytes: u64) -> Result<Download> {
        let mut response = client.get(url).timeout(timeout).send().await.map_err(|err| Self::map_error(err, url))?;
        let status = response.status();
        if status.is_redirection() {
            let location = response.headers().get(reqwest::header::LOCATION).and_then(|v| v.to_str().ok());
            if let Some(location) = location {
                exn::bail!(ErrorKind::Redirect {
                    status: status.as_u16(),
                    location: location.to_string(),
                });
            }
        }
        if !status.is_success() {
            exn::bail!(ErrorKind::from_status(status.as_u16(), url));
        }
        if response.content_length().is_some_and(|len| len > max_bytes) {
            exn::bail!(ErrorKind::TooLarge(max_bytes));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|err| Self::map_error(err, url))? {
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                exn::bail!(ErrorKind::TooLarge(max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(Download { bytes, content_type })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value> {
        let download = Self::fetch(&self.api, url, timeout, MAX_JSON_BYTES).await?;
        let value = serde_json::from_slice(&download.bytes)
            .map_err(|err| ErrorKind::InvalidResponse(format!("{url}: {err}")))?;
        Ok(value)
    }

    async fn get_bytes(&self, url: &str, timeout: Duration, max_bytes: u64) -> Result<Download> {
        Self::fetch(&self.download, url, timeout, max_bytes).await
    }
}
