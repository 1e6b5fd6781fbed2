use crate::config::TrustedProxy;
use axum::http::{HeaderMap, HeaderName};
use std::net::IpAddr;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Resolves the originating client address.
///
/// The socket peer is returned unless it is a trusted proxy. In that case `X-Forwarded-For` is
/// walked right to left and the first untrusted hop wins (the left-most hop when every entry is
/// trusted). A malformed entry makes the header unusable and the peer is returned.
pub fn resolve_client_ip(
    peer: Option<IpAddr>,
    headers: &HeaderMap,
    trusted: &[TrustedProxy],
) -> Option<IpAddr> {
    let peer = peer?;
    let is_trusted = |ip: IpAddr| trusted.iter().any(|p| p.contains(ip));
    if !is_trusted(peer) {
        return Some(peer);
    }

    let hops: Option<Vec<IpAddr>> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|hop| hop.trim().parse::<IpAddr>().ok())
        .collect();

    let Some(hops) = hops.filter(|h| !h.is_empty()) else {
        return Some(peer);
    };
    hops.iter()
        .rev()
        .copied()
        .find(|ip| !is_trusted(*ip))
        .or_else(|| hops.first().copied())
}
