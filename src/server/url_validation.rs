use crate::error::RelayError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Validate that an upstream URL is safe to fetch (SSRF protection).
///
/// Accepts only `http://` and `https://` URLs with a host. IP literals are
/// checked against private/reserved ranges unless `allow_private` is set
/// (dev mode, so loopback test origins work). Hostnames are accepted without
/// DNS resolution — DNS rebinding is a known limitation accepted here.
///
/// # Errors
/// Returns [`RelayError::InvalidInput`] for invalid URLs, non-HTTP(S)
/// schemes, and blocked IP literals.
pub fn validate_upstream_url(url: &str, allow_private: bool) -> Result<Url, RelayError> {
    let parsed =
        Url::parse(url).map_err(|_| RelayError::InvalidInput(format!("invalid URL: {url}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(RelayError::InvalidInput(format!(
                "scheme '{scheme}' not allowed, only http/https permitted"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| RelayError::InvalidInput(format!("no host in URL: {url}")))?;

    if !allow_private {
        let blocked = match host {
            Host::Ipv4(ip) => is_blocked_ipv4(ip),
            Host::Ipv6(ip) => is_blocked_ipv6(ip),
            // Hostnames are allowed — we cannot resolve them without async DNS
            Host::Domain(_) => false,
        };
        if blocked {
            return Err(RelayError::InvalidInput(format!(
                "private or reserved address not allowed: {host}"
            )));
        }
    }

    Ok(parsed)
}

/// Private or reserved IPv4 ranges: `0.0.0.0/8`, RFC 1918, loopback, and
/// `169.254.0.0/16` link-local (cloud-metadata endpoints).
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    ip.octets()[0] == 0 || ip.is_private() || ip.is_loopback() || ip.is_link_local()
}

/// Private or reserved IPv6 ranges: loopback, `fe80::/10` link-local,
/// `fc00::/7` unique-local.
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let s = ip.segments();

    ip.is_loopback() || (s[0] & 0xffc0) == 0xfe80 || (s[0] & 0xfe00) == 0xfc00
}
