//! Source-address admission policy.
//!
//! This predicate is the entire trust boundary of the proxy: a peer is
//! admitted only if its address names the local machine. There is no
//! authentication and no allow-list beyond it.

use std::net::{IpAddr, SocketAddr};

/// Returns true iff `addr` is a loopback or unspecified ("any local") address.
///
/// IPv4 addresses mapped into IPv6 (`::ffff:a.b.c.d`) are judged by their
/// IPv4 form, so a dual-stack listener treats `::ffff:127.0.0.1` as loopback.
pub fn is_admissible(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => ip.is_loopback() || ip.is_unspecified(),
        IpAddr::V6(ip) => {
            if let Some(mapped) = ip.to_ipv4_mapped() {
                return is_admissible(IpAddr::V4(mapped));
            }
            ip.is_loopback() || ip.is_unspecified()
        }
    }
}

/// Convenience wrapper for a full peer address.
pub fn is_admissible_peer(peer: &SocketAddr) -> bool {
    is_admissible(peer.ip())
}
