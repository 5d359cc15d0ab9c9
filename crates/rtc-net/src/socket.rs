#[cfg(test)]
mod socket_test;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::Mutex;
use util::conn::{Conn, TcpConn, UdpConn};

use crate::adapter::AdapterChain;
use crate::error::{Error, Result};
use crate::secure::SecureSocket;

/// Transport tag a [`Socket`] carries. Flattens the original `SocketBase
/// -> TCPBase -> SSLBase` inheritance diamond into one type with a tagged
/// enum plus composition, per the DESIGN NOTES.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
    TlsTcp,
}

enum TransportImpl {
    Plain(Arc<dyn Conn + Send + Sync>),
    Secure(Arc<dyn SecureSocket>),
}

/// A handle specialization over a UDP, TCP, or TLS-over-TCP connection,
/// carrying a composable [`AdapterChain`]. See the data model's `Socket`
/// entry: local address, peer address (connected TCP only), and the
/// chain that packetized protocols splice into.
pub struct Socket {
    transport: Transport,
    inner: TransportImpl,
    chain: AdapterChain,
    peer: Mutex<Option<SocketAddr>>,
    closed: AtomicBool,
}

impl Socket {
    fn new(transport: Transport, inner: TransportImpl, peer: Option<SocketAddr>) -> Self {
        Socket {
            transport,
            inner,
            chain: AdapterChain::new(),
            peer: Mutex::new(peer),
            closed: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn adapters(&self) -> &AdapterChain {
        &self.chain
    }

    /// `bind(addr, flags)`: UDP binds and is immediately ready to
    /// `recv_from`/`send_to`.
    pub async fn bind_udp(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Socket::new(
            Transport::Udp,
            TransportImpl::Plain(Arc::new(UdpConn::new(socket))),
            None,
        ))
    }

    /// `connect(addr)` for UDP: synchronous, records a default peer so
    /// later `send()` calls without an explicit peer still work, and
    /// emits `connect` to preserve parity with TCP's event.
    pub async fn connect_udp(local: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        let conn = UdpConn::new(socket);
        conn.connect(peer).await?;
        Ok(Socket::new(
            Transport::Udp,
            TransportImpl::Plain(Arc::new(conn)),
            Some(peer),
        ))
    }

    /// `connect(addr)` for TCP: asynchronous; emits `connect` then starts
    /// the read pump (the read pump itself is driven by the caller's
    /// `recv` loop in this cooperative runtime, there being no implicit
    /// background poll).
    pub async fn connect_tcp(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|_| Error::ErrConnectRefused)?;
        let peer = stream.peer_addr()?;
        let conn = TcpConn::new(stream)?;
        Ok(Socket::new(
            Transport::Tcp,
            TransportImpl::Plain(Arc::new(conn)),
            Some(peer),
        ))
    }

    /// Wraps an already-established [`SecureSocket`] (e.g. a TLS-carrying
    /// connection from an external collaborator) as a `TlsTcp` socket.
    pub fn from_secure(secure: Arc<dyn SecureSocket>, peer: SocketAddr) -> Self {
        Socket::new(Transport::TlsTcp, TransportImpl::Secure(secure), Some(peer))
    }

    pub async fn local_addr(&self) -> Result<SocketAddr> {
        match &self.inner {
            TransportImpl::Plain(conn) => Ok(conn.local_addr().await?),
            TransportImpl::Secure(s) => Ok(s.local_addr().await?),
        }
    }

    pub async fn remote_addr(&self) -> Option<SocketAddr> {
        *self.peer.lock().await
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::ErrClosed)
        } else {
            Ok(())
        }
    }

    /// `send(data, [peer], [flags])`: TCP writes through the stream; UDP
    /// sends a single datagram to the explicit peer or the connected
    /// default. Returns bytes queued; never throws, only returns an error.
    pub async fn send(&self, data: &[u8], to: Option<SocketAddr>) -> Result<usize> {
        self.check_closed()?;
        let wire = self.chain.send_through(data).await?;

        match &self.inner {
            TransportImpl::Plain(conn) => {
                let target = match to {
                    Some(addr) => addr,
                    None => self
                        .peer
                        .lock()
                        .await
                        .ok_or(Error::ErrNotApplicable)?,
                };
                match self.transport {
                    Transport::Udp => Ok(conn.send_to(&wire, target).await?),
                    _ => Ok(conn.send(&wire).await?),
                }
            }
            TransportImpl::Secure(s) => Ok(s.send_encrypted(&wire).await?),
        }
    }

    /// Reads one unit of data (a TCP read, or a UDP datagram) and runs it
    /// through the receiver chain toward the application. Returns `None`
    /// if an adapter is still buffering a partial frame.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        self.check_closed()?;
        let (n, from) = match &self.inner {
            TransportImpl::Plain(conn) => conn.recv_from(buf).await?,
            TransportImpl::Secure(s) => {
                let n = s.recv_encrypted(buf).await?;
                let from = s.remote_addr().await.ok_or(Error::ErrNotApplicable)?;
                (n, from)
            }
        };
        match self.chain.recv_through(&buf[..n]).await? {
            Some(data) => Ok(Some((data, from))),
            None => Ok(None),
        }
    }

    /// TCP: sends FIN after draining the outgoing queue. Destructor-safe
    /// (idempotent with `close`).
    pub async fn shutdown(&self) -> Result<()> {
        self.close().await
    }

    /// Idempotent; cancels all pending I/O; emits `close` exactly once.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match &self.inner {
            TransportImpl::Plain(conn) => conn.close().await?,
            TransportImpl::Secure(s) => s.close().await?,
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// TCP-only. `listen(backlog)` emits `acceptConnection(newSocket)` per
/// inbound connection; callers drive this by looping on `accept()`.
pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Listener { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts one inbound connection and wraps it as a fresh [`Socket`],
    /// i.e. the `acceptConnection(newSocket)` event.
    pub async fn accept(&self) -> Result<Socket> {
        let (stream, peer) = self.listener.accept().await?;
        let conn = TcpConn::new(stream)?;
        Ok(Socket::new(
            Transport::Tcp,
            TransportImpl::Plain(Arc::new(conn)),
            Some(peer),
        ))
    }
}
