use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use util::vnet::net::Net;
use util::Conn;

use super::RelayAddressGenerator;
use crate::error::*;

/// `RelayAddressGeneratorNone` hands back whatever address it actually bound
/// to, with no rewriting. Useful in tests and for servers that are directly
/// reachable (no NAT) on the interface they bind.
pub struct RelayAddressGeneratorNone {
    pub address: String,
    pub net: Arc<Net>,
}

#[async_trait]
impl RelayAddressGenerator for RelayAddressGeneratorNone {
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
        let local_addr = conn.local_addr().await?;
        Ok((conn, local_addr))
    }
}
