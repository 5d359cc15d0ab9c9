use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{lookup_host, UdpSocket};

use crate::conn::{Conn, UdpConn};
use crate::error::Result;

/// Reserved for future simulated-network configuration. Carrying the type
/// (even though it is presently uninhabited) keeps `Net::new`'s signature
/// stable if a simulation mode is added later.
#[derive(Debug, Clone, Default)]
pub struct NetConfig;

/// Binds sockets against the real network stack.
///
/// This stands in for the upstream crate's virtual network: callers that
/// want a `Conn` go through `Net` rather than `tokio::net` directly, which
/// is what lets `RelayAddressGenerator` implementations stay agnostic to
/// how a socket is actually created.
#[derive(Debug, Default, Clone)]
pub struct Net {
    _config: Option<NetConfig>,
}

impl Net {
    pub fn new(config: Option<NetConfig>) -> Self {
        Net { _config: config }
    }

    /// Always `false`: this `Net` only ever binds real OS sockets.
    pub fn is_virtual(&self) -> bool {
        false
    }

    pub async fn bind_udp(&self, addr: SocketAddr) -> Result<Arc<dyn Conn + Send + Sync>> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Arc::new(UdpConn::new(socket)))
    }

    pub async fn resolve_addr(&self, use_ipv4: bool, host: &str) -> Result<SocketAddr> {
        let mut addrs = lookup_host(host).await?;
        let found = if use_ipv4 {
            addrs.find(|a| a.is_ipv4())
        } else {
            addrs.find(|a| a.is_ipv6())
        };
        found.ok_or_else(|| crate::error::Error::Other(format!("no address found for {host}")))
    }
}
