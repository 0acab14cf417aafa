use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use crate::error::{OscError, Result};

/// Literal IPv4 address, or the first IPv4 result of a DNS lookup.
pub fn resolve_ipv4(host: &str) -> Result<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }

    let resolved = (host, 0).to_socket_addrs().map_err(|e| OscError::Resolve {
        host: host.to_string(),
        source: Some(Arc::new(e)),
    })?;

    resolved
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| OscError::Resolve {
            host: host.to_string(),
            source: None,
        })
}

pub fn resolve_endpoint(host: &str, port: u16) -> Result<SocketAddr> {
    resolve_ipv4(host).map(|ip| SocketAddr::from((ip, port)))
}
