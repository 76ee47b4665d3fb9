//! Network address policy shared by every outgoing request.
//!
//! [`PublicResolver`] is installed as the DNS resolver of [`ReqwestClient`](crate::ReqwestClient),
//! so whatever address a host name resolves to at connect time is checked,
//! not only the one seen when a URL was validated.

use reqwest::Url;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::net::{IpAddr, SocketAddr};

/// Addresses no request may be sent to.
pub fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                // 100.64.0.0/10, carrier-grade NAT
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        },
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal(IpAddr::V4(v4)),
            None => v6.is_loopback() || v6.is_unspecified() || v6.is_unique_local() || v6.is_unicast_link_local(),
        },
    }
}

/// Whether a redirect target may be followed automatically: https, and not an
/// internal address literal. Host names are covered by [`PublicResolver`].
pub fn redirect_allowed(url: &Url) -> bool {
    if url.scheme() != "https" {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    match host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        Ok(ip) => !is_internal(ip),
        Err(_) => true,
    }
}

/// System DNS, refusing any name that resolves to an internal address.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicResolver;

impl PublicResolver {
    pub async fn lookup(host: &str) -> std::io::Result<Vec<SocketAddr>> {
        let addresses: Vec<SocketAddr> = tokio::net::lookup_host((host, 0)).await?.collect();
        if let Some(addr) = addresses.iter().find(|addr| is_internal(addr.ip())) {
            return Err(IoError::new(
                IoErrorKind::PermissionDenied,
                format!("{host} resolves to internal address {}", addr.ip()),
            ));
        }
        if addresses.is_empty() {
            return Err(IoError::new(IoErrorKind::NotFound, format!("{host} resolved to no addresses")));
        }
        Ok(addresses)
    }
}

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let addresses = Self::lookup(name.as_str()).await?;
            let addrs: Addrs = Box::new(addresses.into_iter());
            Ok(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[rstest]
    #[case(IpAddr::V4(Ipv4Addr::LOCALHOST), true)]
    #[case(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)), true)]
    #[case(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1)), true)]
    #[case(IpAddr::V4(Ipv4Addr::new(172, 20, 0, 1)), true)]
    #[case(IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254)), true)]
    #[case(IpAddr::V4(Ipv4Addr::new(100, 100, 0, 1)), true)]
    #[case(IpAddr::V6(Ipv6Addr::LOCALHOST), true)]
    #[case(IpAddr::V6("fd00::1".parse().unwrap()), true)]
    #[case(IpAddr::V6("fe80::1".parse().unwrap()), true)]
    #[case(IpAddr::V6("::ffff:127.0.0.1".parse().unwrap()), true)]
    #[case(IpAddr::V4(Ipv4Addr::new(142, 250, 80, 46)), false)]
    #[case(IpAddr::V6("2607:f8b0:4004:800::200e".parse().unwrap()), false)]
    fn test_internal_addresses(#[case] ip: IpAddr, #[case] internal: bool) {
        assert_eq!(is_internal(ip), internal);
    }

    #[rstest]
    #[case("https://covers.openlibrary.org/b/id/1-L.jpg", true)]
    #[case("http://covers.openlibrary.org/b/id/1-L.jpg", false)]
    #[case("https://169.254.169.254/latest/meta-data", false)]
    #[case("https://[::1]/x", false)]
    #[case("https://142.250.80.46/x", true)]
    #[case("file:///etc/passwd", false)]
    fn test_redirect_allowed(#[case] url: &str, #[case] allowed: bool) {
        assert_eq!(redirect_allowed(&Url::parse(url).unwrap()), allowed);
    }

    #[tokio::test]
    async fn test_localhost_is_refused() {
        let err = PublicResolver::lookup("localhost").await.unwrap_err();
        assert_eq!(err.kind(), IoErrorKind::PermissionDenied);
    }
}
