use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use util::vnet::net::Net;
use util::Conn;

use super::RelayAddressGenerator;
use crate::error::*;

/// `RelayAddressGeneratorRanges` restricts allocated relay ports to
/// `[min_port, max_port]`, matching the server configuration's `minPort`/
/// `maxPort` knobs. A fixed `requested_port` (e.g. from a reservation) is
/// honored as-is; otherwise a random port in range is tried up to
/// `max_retries` times.
pub struct RelayAddressGeneratorRanges {
    pub relay_address: IpAddr,
    pub min_port: u16,
    pub max_port: u16,
    pub max_retries: u16,
    pub address: String,
    pub net: Arc<Net>,
}

#[async_trait]
impl RelayAddressGenerator for RelayAddressGeneratorRanges {
    fn validate(&self) -> Result<()> {
        if self.min_port == 0 {
            Err(Error::ErrMinPortNotZero)
        } else if self.max_port == 0 {
            Err(Error::ErrMaxPortNotZero)
        } else if self.max_port < self.min_port {
            Err(Error::ErrMaxPortLessThanMinPort)
        } else if self.address.is_empty() {
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
        let max_retries = if self.max_retries == 0 {
            10
        } else {
            self.max_retries
        };

        if requested_port != 0 {
            let addr = self
                .net
                .resolve_addr(use_ipv4, &format!("{}:{}", self.address, requested_port))
                .await?;
            let conn = self.net.bind_udp(addr).await?;
            let mut relay_addr = conn.local_addr().await?;
            relay_addr.set_ip(self.relay_address);
            return Ok((conn, relay_addr));
        }

        for _ in 0..max_retries {
            let port =
                self.min_port + rand::random::<u16>() % (self.max_port + 1 - self.min_port);
            let addr = match self
                .net
                .resolve_addr(use_ipv4, &format!("{}:{}", self.address, port))
                .await
            {
                Ok(addr) => addr,
                Err(_) => continue,
            };
            let conn = match self.net.bind_udp(addr).await {
                Ok(conn) => conn,
                Err(_) => continue,
            };
            let mut relay_addr = conn.local_addr().await?;
            relay_addr.set_ip(self.relay_address);
            return Ok((conn, relay_addr));
        }

        Err(Error::ErrMaxRetriesExceeded)
    }
}
