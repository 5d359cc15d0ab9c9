#[cfg(test)]
mod tcp_relay_test;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use util::Conn;

use super::five_tuple::FiveTuple;
use crate::error::{Error, Result};
use crate::proto::connid::ConnectionId;

/// How long the server holds a peer connection open waiting for the client
/// to complete the matching `ConnectionBind`, per RFC 6062 Section 4.
pub(crate) const CONNECTION_BIND_TIMEOUT: Duration = Duration::from_secs(30);

/// A TCP connection the server has established with a peer (either dialed
/// via `Connect`, or accepted on the allocation's relay listener) that is
/// waiting to be spliced with the client's data connection once
/// `ConnectionBind` names its `ConnectionId`.
pub(crate) struct PendingPeerConn {
    pub(crate) stream: TcpStream,
    pub(crate) peer_addr: SocketAddr,
    pub(crate) accepted_at: Instant,
}

/// `TcpAllocation` is the RFC 6062 analogue of [`super::Allocation`] for
/// TCP-allocated relays: rather than a single relay socket shared by every
/// peer, each peer gets its own TCP connection which the server must pair
/// 1:1 with a second connection the client opens back to the server.
pub struct TcpAllocation {
    pub(crate) five_tuple: FiveTuple,
    pub(crate) turn_socket: Arc<dyn Conn + Send + Sync>,
    pub(crate) listener: Arc<TcpListener>,
    pub(crate) relay_addr: SocketAddr,
    pub(crate) username: String,
    next_connection_id: AtomicU32,
    pending: Mutex<HashMap<ConnectionId, PendingPeerConn>>,
    permissions: Mutex<Vec<SocketAddr>>,
}

impl TcpAllocation {
    pub fn new(
        five_tuple: FiveTuple,
        turn_socket: Arc<dyn Conn + Send + Sync>,
        listener: TcpListener,
        relay_addr: SocketAddr,
        username: String,
    ) -> Self {
        TcpAllocation {
            five_tuple,
            turn_socket,
            listener: Arc::new(listener),
            relay_addr,
            username,
            next_connection_id: AtomicU32::new(1),
            pending: Mutex::new(HashMap::new()),
            permissions: Mutex::new(Vec::new()),
        }
    }

    pub async fn has_permission(&self, addr: &SocketAddr) -> bool {
        self.permissions.lock().await.iter().any(|p| p.ip() == addr.ip())
    }

    pub async fn add_permission(&self, addr: SocketAddr) {
        let mut permissions = self.permissions.lock().await;
        if !permissions.iter().any(|p| p.ip() == addr.ip()) {
            permissions.push(addr);
        }
    }

    fn new_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a peer connection (dialed via `Connect` or accepted from
    /// the relay listener) and returns the `ConnectionId` the client must
    /// quote on the matching `ConnectionBind`.
    pub async fn register_pending(&self, stream: TcpStream, peer_addr: SocketAddr) -> ConnectionId {
        let id = self.new_connection_id();
        let mut pending = self.pending.lock().await;
        pending.insert(
            id,
            PendingPeerConn {
                stream,
                peer_addr,
                accepted_at: Instant::now(),
            },
        );
        id
    }

    /// Takes ownership of the pending peer connection for `id`, if any,
    /// removing it from the pending table.
    pub async fn take_pending(&self, id: ConnectionId) -> Option<PendingPeerConn> {
        self.pending.lock().await.remove(&id)
    }

    /// Evicts any pending peer connections that have been waiting longer
    /// than [`CONNECTION_BIND_TIMEOUT`] without a `ConnectionBind`.
    pub async fn evict_expired(&self) {
        let mut pending = self.pending.lock().await;
        pending.retain(|id, p| {
            let expired = p.accepted_at.elapsed() >= CONNECTION_BIND_TIMEOUT;
            if expired {
                log::debug!("evicting unbound peer connection {id} for {}", p.peer_addr);
            }
            !expired
        });
    }

    pub async fn close(&self) -> Result<()> {
        let _ = self.turn_socket.close().await;
        let mut pending = self.pending.lock().await;
        pending.clear();
        Ok(())
    }
}

/// Accepts incoming peer connections on `alloc`'s relay listener, registers
/// each as pending, and notifies the client with a `ConnectionAttempt`
/// indication via `notify`. Runs until the listener is dropped or errors.
pub(crate) async fn run_accept_loop<F, Fut>(alloc: Arc<TcpAllocation>, notify: F)
where
    F: Fn(Arc<TcpAllocation>, ConnectionId, SocketAddr) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send,
{
    loop {
        match alloc.listener.accept().await {
            Ok((stream, peer_addr)) => {
                if !alloc.has_permission(&peer_addr).await {
                    log::debug!("rejecting peer connection from {peer_addr}: no permission");
                    continue;
                }
                let id = alloc.register_pending(stream, peer_addr).await;
                if let Err(err) = notify(Arc::clone(&alloc), id, peer_addr).await {
                    log::warn!("failed to notify client of ConnectionAttempt: {err}");
                }
            }
            Err(err) => {
                log::debug!("tcp relay listener for {} closed: {err}", alloc.five_tuple);
                return;
            }
        }
    }
}

/// Splices two already-connected TCP streams until either side closes,
/// relaying raw bytes with no TURN framing, as RFC 6062 Section 8 requires
/// once a data connection has been bound.
pub(crate) async fn splice(mut a: TcpStream, mut b: TcpStream) -> Result<()> {
    tokio::io::copy_bidirectional(&mut a, &mut b)
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// RFC 6062 Section 8 splice for a client data connection still wrapped in
/// a [`Conn`], relaying raw bytes against a raw peer `TcpStream` until
/// either side closes. The client side is already in the hands of the
/// server's `Conn` abstraction by the time a `ConnectionBind` succeeds, so
/// this copies through `Conn::recv`/`Conn::send` rather than requiring an
/// owned `TcpStream` on both ends.
pub(crate) async fn splice_conn(conn: Arc<dyn Conn + Send + Sync>, peer: TcpStream) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (mut peer_rd, mut peer_wr) = peer.into_split();

    let to_peer = {
        let conn = Arc::clone(&conn);
        async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let n = conn.recv(&mut buf).await?;
                if n == 0 {
                    return Ok(());
                }
                peer_wr.write_all(&buf[..n]).await.map_err(Error::from)?;
            }
        }
    };

    let from_peer = async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let n = peer_rd.read(&mut buf).await.map_err(Error::from)?;
            if n == 0 {
                return Ok(());
            }
            conn.send(&buf[..n]).await?;
        }
    };

    tokio::select! {
        r = to_peer => r,
        r = from_peer => r,
    }
}
