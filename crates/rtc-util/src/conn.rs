#[cfg(test)]
mod conn_test;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Common read/write surface for a transport-layer connection, whether it
/// is a connected `TcpStream` or a not-necessarily-connected `UdpSocket`.
/// The TURN and STUN transaction layers only ever talk to a `dyn Conn`, so
/// a server or client can be pointed at a real socket or a test double
/// without caring which.
#[async_trait]
pub trait Conn {
    async fn connect(&self, addr: SocketAddr) -> Result<()>;
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;
    async fn send(&self, buf: &[u8]) -> Result<usize>;
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;
    async fn local_addr(&self) -> Result<SocketAddr>;
    async fn remote_addr(&self) -> Option<SocketAddr>;
    async fn close(&self) -> Result<()>;
}

/// Wraps a `tokio::net::UdpSocket`. `connect()` records a default peer the
/// way the spec's `connect(addr)` contract for UDP describes ("synchronous,
/// records default peer for sendless-peer sends").
pub struct UdpConn {
    socket: UdpSocket,
    remote: Mutex<Option<SocketAddr>>,
    closed: AtomicBool,
}

impl UdpConn {
    pub fn new(socket: UdpSocket) -> Self {
        UdpConn {
            socket,
            remote: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::ErrClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Conn for UdpConn {
    async fn connect(&self, addr: SocketAddr) -> Result<()> {
        self.check_closed()?;
        self.socket.connect(addr).await?;
        *self.remote.lock().await = Some(addr);
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.check_closed()?;
        Ok(self.socket.recv(buf).await?)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.check_closed()?;
        Ok(self.socket.recv_from(buf).await?)
    }

    async fn send(&self, buf: &[u8]) -> Result<usize> {
        self.check_closed()?;
        Ok(self.socket.send(buf).await?)
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        self.check_closed()?;
        Ok(self.socket.send_to(buf, target).await?)
    }

    async fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    async fn remote_addr(&self) -> Option<SocketAddr> {
        *self.remote.lock().await
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Wraps a connected `tokio::net::TcpStream`. Used both for TURN's
/// TCP-allocation control connection and RFC 6062 relayed byte streams.
pub struct TcpConn {
    stream: Mutex<TcpStream>,
    local: SocketAddr,
    peer: SocketAddr,
    closed: AtomicBool,
}

impl TcpConn {
    pub fn new(stream: TcpStream) -> Result<Self> {
        let local = stream.local_addr()?;
        let peer = stream.peer_addr()?;
        Ok(TcpConn {
            stream: Mutex::new(stream),
            local,
            peer,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Conn for TcpConn {
    async fn connect(&self, _addr: SocketAddr) -> Result<()> {
        // Already connected; TCP connect happens at construction time.
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ErrClosed);
        }
        use tokio::io::AsyncReadExt;
        let mut stream = self.stream.lock().await;
        Ok(stream.read(buf).await?)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let n = self.recv(buf).await?;
        Ok((n, self.peer))
    }

    async fn send(&self, buf: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ErrClosed);
        }
        use tokio::io::AsyncWriteExt;
        let mut stream = self.stream.lock().await;
        stream.write_all(buf).await?;
        Ok(buf.len())
    }

    async fn send_to(&self, buf: &[u8], _target: SocketAddr) -> Result<usize> {
        self.send(buf).await
    }

    async fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local)
    }

    async fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        use tokio::io::AsyncWriteExt;
        let mut stream = self.stream.lock().await;
        let _ = stream.shutdown().await;
        Ok(())
    }
}
