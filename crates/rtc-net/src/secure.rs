use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Result;

/// The only capability a TLS-carrying socket needs to expose to the rest
/// of the stack. TLS primitives themselves are out of scope (DESIGN NOTES
/// / Non-goals); a `SecureSocket` is consumed purely through handshake
/// completion and encrypted send/recv, so a real TLS implementation can be
/// substituted without this crate depending on one.
#[async_trait]
pub trait SecureSocket: Send + Sync {
    /// Drives the handshake to completion. A no-op if already complete.
    async fn handshake(&self) -> Result<()>;

    async fn handshake_complete(&self) -> bool;

    async fn send_encrypted(&self, data: &[u8]) -> Result<usize>;

    async fn recv_encrypted(&self, buf: &mut [u8]) -> Result<usize>;

    async fn local_addr(&self) -> Result<SocketAddr>;

    async fn remote_addr(&self) -> Option<SocketAddr>;

    async fn close(&self) -> Result<()>;
}
