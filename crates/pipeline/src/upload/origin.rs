//! Origin validation for remote image URLs.

use super::error::{ErrorKind, Result};
use async_trait::async_trait;
use folio_fetch::net::is_internal;
use reqwest::Url;
use std::net::IpAddr;
use std::sync::Arc;

/// Turns a host name into addresses.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// [`HostResolver`] using the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        Ok(tokio::net::lookup_host((host, port)).await?.map(|addr| addr.ip()).collect())
    }
}

/// `pattern` is either an exact host or `*.suffix`, which matches any
/// subdomain of `suffix` but not `suffix` itself.
fn host_matches(host: &str, pattern: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => host.len() > suffix.len() + 1 && host.ends_with(suffix) && {
            let boundary = host.len() - suffix.len() - 1;
            host.as_bytes()[boundary] == b'.'
        },
        None => host == pattern,
    }
}

/// Decides whether a remote URL may be downloaded.
#[derive(Clone)]
pub struct OriginPolicy {
    allowed_hosts: Vec<String>,
    resolver: Arc<dyn HostResolver>,
}
impl OriginPolicy {
    pub fn new(allowed_hosts: &[String], resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            allowed_hosts: allowed_hosts.iter().map(|h| h.trim().to_ascii_lowercase()).collect(),
            resolver,
        }
    }

    pub fn is_allowed_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.allowed_hosts.iter().any(|pattern| host_matches(&host, pattern))
    }

    /// Validate `url`, returning it parsed.
    ///
    /// Https only, allowlisted host, and every resolved address public.
    pub async fn check(&self, url: &str) -> Result<Url> {
        let parsed = Url::parse(url).map_err(|err| ErrorKind::OriginRejected(format!("invalid URL: {err}")))?;
        if parsed.scheme() != "https" {
            exn::bail!(ErrorKind::OriginRejected(format!("scheme {} not allowed", parsed.scheme())));
        }
        let Some(host) = parsed.host_str() else {
            exn::bail!(ErrorKind::OriginRejected("missing host".to_string()));
        };
        if !self.is_allowed_host(host) {
            exn::bail!(ErrorKind::OriginRejected(format!("host {host} not in allowlist")));
        }
        let port = parsed.port_or_known_default().unwrap_or(443);
        let addresses = self
            .resolver
            .resolve(host, port)
            .await
            .map_err(|err| ErrorKind::OriginRejected(format!("could not resolve {host}: {err}")))?;
        if addresses.is_empty() {
            exn::bail!(ErrorKind::OriginRejected(format!("{host} resolved to no addresses")));
        }
        if let Some(ip) = addresses.iter().copied().find(|ip| is_internal(*ip)) {
            exn::bail!(ErrorKind::OriginRejected(format!("{host} resolves to internal address {ip}")));
        }
        Ok(parsed)
    }
}
