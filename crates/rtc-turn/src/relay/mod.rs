pub mod relay_none;
pub mod relay_range;
pub mod relay_static;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use util::Conn;

use crate::error::{Error, Result};

/// `RelayAddressGenerator` is used to generate a relay address when creating
/// an allocation. The server is given one at construction and calls
/// `allocate_conn` once per new five-tuple; callers can supply their own to
/// restrict the allocatable port range or bind behind a NAT with a fixed
/// public IP.
#[async_trait]
pub trait RelayAddressGenerator {
    /// Confirms that the generator is properly configured.
    fn validate(&self) -> Result<()>;

    /// Allocates a relay `Conn` and returns it along with the address that
    /// should be advertised to the client as XOR-RELAYED-ADDRESS.
    async fn allocate_conn(
        &self,
        use_ipv4: bool,
        requested_port: u16,
    ) -> Result<(Arc<dyn Conn + Send + Sync>, SocketAddr)>;

    /// Allocates a TCP listening socket for an RFC 6062 TCP allocation.
    /// Generators that only support UDP relaying (the RFC 5766 default)
    /// can leave this at its default, which rejects the allocation with
    /// `ErrUnsupportedTransportProtocol`.
    async fn allocate_tcp_listener(
        &self,
        _use_ipv4: bool,
        _requested_port: u16,
    ) -> Result<(TcpListener, SocketAddr)> {
        Err(Error::ErrUnsupportedTransportProtocol)
    }
}
