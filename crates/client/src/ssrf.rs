//! SSRF (Server-Side Request Forgery) protection.
//!
//! Direct (unproxied) fetches and the relay's generic passthrough accept
//! caller-supplied URLs, so both validate the scheme and any literal IP
//! host before touching the network. Hostname targets resolve at connect
//! time; the deployment's egress policy covers those.

use ipnet::Ipv4Net;
use std::net::IpAddr;
use std::sync::LazyLock;
use url::Url;

/// Denied URL schemes that should never be fetched.
pub const DENIED_SCHEMES: &[&str] = &[
    "file",
    "ftp",
    "data",
    "javascript",
    "chrome",
    "about",
    "blob",
    "ws",
    "wss",
];

/// IPv4 ranges blocked beyond what the std `Ipv4Addr` predicates cover:
/// CGNAT (RFC 6598), IETF protocol assignments, and benchmarking.
static EXTRA_BLOCKED_V4: LazyLock<Vec<Ipv4Net>> = LazyLock::new(|| {
    ["100.64.0.0/10", "192.0.0.0/24", "198.18.0.0/15"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
});

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked scheme: {0}")]
    BlockedScheme(String),

    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("invalid target URL: {0}")]
    InvalidTarget(String),
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16)
/// - CGNAT (100.64/10) and benchmarking (198.18/15) ranges
/// - Link-local addresses (169.254/16, fe80::/10)
/// - Multicast addresses (224/4, ff00::/8)
/// - Unspecified addresses (0.0.0.0/8, ::)
/// - IPv6 unique local (fc00::/7)
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
                || EXTRA_BLOCKED_V4.iter().any(|net| net.contains(&v4))
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate that an IP address is not private or reserved.
///
/// Returns an error if the IP is blocked.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Validate a caller-supplied target URL before a direct fetch.
///
/// Rejects denied schemes, anything that is not http(s), and literal IP
/// hosts in private or reserved ranges.
pub fn validate_target(target: &str) -> Result<Url, SsrfError> {
    let url = Url::parse(target).map_err(|e| SsrfError::InvalidTarget(e.to_string()))?;

    let scheme = url.scheme().to_ascii_lowercase();
    if DENIED_SCHEMES.contains(&scheme.as_str()) || (scheme != "http" && scheme != "https") {
        return Err(SsrfError::BlockedScheme(scheme));
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => validate_ip(IpAddr::V4(v4))?,
        Some(url::Host::Ipv6(v6)) => validate_ip(IpAddr::V6(v6))?,
        Some(url::Host::Domain(_)) => {}
        None => return Err(SsrfError::InvalidTarget("missing host".to_string())),
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_is_private_or_reserved_loopback_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(127, 255, 255, 255))));
    }

    #[test]
    fn test_is_private_or_reserved_private_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(172, 31, 255, 255))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_cgnat_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(100, 64, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(100, 127, 255, 255))));
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(100, 128, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_benchmarking_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(198, 18, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(198, 19, 255, 255))));
    }

    #[test]
    fn test_is_private_or_reserved_link_local_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(169, 254, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_multicast_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(239, 255, 255, 255))));
    }

    #[test]
    fn test_is_private_or_reserved_unspecified_v4() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::UNSPECIFIED)));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_loopback_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn test_is_private_or_reserved_unique_local_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfdff, 0, 0, 0, 0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_link_local_v6() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))));
    }

    #[test]
    fn test_is_private_or_reserved_public_v4() {
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))));
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))));
    }

    #[test]
    fn test_is_private_or_reserved_public_v6() {
        assert!(!is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 1))));
    }

    #[test]
    fn test_validate_ip_public() {
        assert!(validate_ip(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))).is_ok());
    }

    #[test]
    fn test_validate_ip_blocked() {
        assert!(validate_ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))).is_err());
        assert!(validate_ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))).is_err());
    }

    #[test]
    fn test_validate_target_public_domain() {
        assert!(validate_target("https://example.com/favicon.ico").is_ok());
    }

    #[test]
    fn test_validate_target_blocked_scheme() {
        assert!(matches!(validate_target("file:///etc/passwd"), Err(SsrfError::BlockedScheme(_))));
        assert!(matches!(validate_target("data:text/plain,hi"), Err(SsrfError::BlockedScheme(_))));
    }

    #[test]
    fn test_validate_target_literal_loopback() {
        assert!(matches!(validate_target("http://127.0.0.1:8080/x"), Err(SsrfError::BlockedIp(_))));
        assert!(matches!(validate_target("http://[::1]/x"), Err(SsrfError::BlockedIp(_))));
    }

    #[test]
    fn test_validate_target_literal_private() {
        assert!(matches!(validate_target("http://192.168.1.1/admin"), Err(SsrfError::BlockedIp(_))));
        assert!(matches!(validate_target("http://10.0.0.2/"), Err(SsrfError::BlockedIp(_))));
    }

    #[test]
    fn test_validate_target_garbage() {
        assert!(matches!(validate_target("not a url"), Err(SsrfError::InvalidTarget(_))));
    }
}
