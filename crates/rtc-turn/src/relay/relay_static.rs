use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use util::vnet::net::Net;
use util::Conn;

use super::RelayAddressGenerator;
use crate::error::*;

/// `RelayAddressGeneratorStatic` always returns the same public IP address
/// for the relay, rewriting whatever local address the generator actually
/// bound to. Use this when the server has a single static, externally
/// reachable IP (the common TURN deployment behind a 1:1 NAT).
pub struct RelayAddressGeneratorStatic {
    /// The IP address advertised to clients as the relay address.
    pub relay_address: IpAddr,
    /// The local address `allocate_conn` binds to, e.g. `"0.0.0.0"`.
    pub address: String,
    pub net: Arc<Net>,
}

#[async_trait]
impl RelayAddressGenerator for RelayAddressGeneratorStatic {
    fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            Err(Error::ErrListeningAddressInvalid)
        } else {
            Ok(())
        }
    }

    async fn allocate_conn(
        &self,
        use_ipv4: bool,
        requested_port: u16,
    ) -> Result<(Arc<dyn Conn + Send + Sync>, SocketAddr)> {
        let addr = self
            .net
            .resolve_addr(use_ipv4, &format!("{}:{}", self.address, requested_port))
            .await?;
        let conn = self.net.bind_udp(addr).await?;
        let mut relay_addr = conn.local_addr().await?;
        relay_addr.set_ip(self.relay_address);
        Ok((conn, relay_addr))
    }

    async fn allocate_tcp_listener(
        &self,
        use_ipv4: bool,
        requested_port: u16,
    ) -> Result<(TcpListener, SocketAddr)> {
        let addr = self
            .net
            .resolve_addr(use_ipv4, &format!("{}:{}", self.address, requested_port))
            .await?;
        let listener = TcpListener::bind(addr).await?;
        let mut relay_addr = listener.local_addr()?;
        relay_addr.set_ip(self.relay_address);
        Ok((listener, relay_addr))
    }
}
