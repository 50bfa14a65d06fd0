use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// Proxy headers consulted, in order, before falling back to the socket peer.
const FORWARDED_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// Best guess at the real client address.
///
/// A forwarded address is only trusted when it is a public one; private, loopback and
/// reserved addresses in proxy headers are skipped.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> IpAddr {
    FORWARDED_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name)?.to_str().ok())
        .filter_map(|value| value.split(',').next()?.trim().parse::<IpAddr>().ok())
        .find(is_public)
        .or(peer)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Stable, opaque identifier for rate-limit keys.
pub fn client_id(ip: &IpAddr) -> String {
    hex::encode(Sha256::digest(ip.to_string().as_bytes()))
}

fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(&v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || a == 0
        || a >= 240
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (64..128).contains(&b)))
}

fn is_public_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
        // 2001:db8::/32 documentation
        || (first == 0x2001 && ip.segments()[1] == 0x0db8))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    fn peer() -> Option<IpAddr> {
        Some("10.1.2.3".parse().unwrap())
    }

    #[test]
    fn test_falls_back_to_peer() {
        assert_eq!(resolve_client_ip(&HeaderMap::new(), peer()), peer().unwrap());
        assert_eq!(
            resolve_client_ip(&HeaderMap::new(), None),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
    }

    #[test]
    fn test_header_precedence() {
        let h = headers(&[
            ("x-real-ip", "198.51.100.7"),
            ("x-forwarded-for", "8.8.8.8"),
            ("cf-connecting-ip", "1.1.1.1"),
        ]);
        // 198.51.100.0/24 is documentation space and never trusted anyway.
        assert_eq!(resolve_client_ip(&h, peer()), "1.1.1.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_forwarded_for_uses_first_entry() {
        let h = headers(&[("x-forwarded-for", "9.9.9.9, 10.0.0.1")]);
        assert_eq!(resolve_client_ip(&h, peer()), "9.9.9.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_private_forwarded_address_ignored() {
        let h = headers(&[("x-forwarded-for", "192.168.1.10"), ("x-real-ip", "127.0.0.1")]);
        assert_eq!(resolve_client_ip(&h, peer()), peer().unwrap());

        let garbage = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(resolve_client_ip(&garbage, peer()), peer().unwrap());
    }

    #[test]
    fn test_ipv6_ranges() {
        assert!(is_public(&"2606:4700::1111".parse().unwrap()));
        assert!(!is_public(&"fd00::1".parse().unwrap()));
        assert!(!is_public(&"fe80::1".parse().unwrap()));
        assert!(!is_public(&"::1".parse().unwrap()));
        assert!(!is_public(&"::ffff:192.168.0.1".parse().unwrap()));
    }

    #[test]
    fn test_client_id_is_stable_hex() {
        let ip: IpAddr = "203.0.114.1".parse().unwrap();
        assert_eq!(client_id(&ip), client_id(&ip));
        assert_eq!(client_id(&ip).len(), 64);
        assert_ne!(client_id(&ip), client_id(&"203.0.114.2".parse().unwrap()));
    }
}
