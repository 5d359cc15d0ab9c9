#[cfg(test)]
mod tcp_test;

// RFC 6062 TCP allocation client specialization: a `ConnectionManager` that
// maps `peerAddress -> peer socket` on top of a TCP allocation obtained the
// normal way via `Client::allocate`.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use stun::agent::TransactionId;
use stun::error_code::*;
use stun::fingerprint::*;
use stun::integrity::*;
use stun::message::*;
use stun::textattrs::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::relay_conn::RelayConnObserver;
use crate::proto::connid::ConnectionId;
use crate::proto::peeraddr::PeerAddress;
use crate::Error;

const CONNECTION_BIND_TIMEOUT: Duration = Duration::from_secs(10);

/// One peer reachable through a TCP allocation: the raw, spliced byte
/// stream obtained once `ConnectionBind` succeeds.
pub struct PeerConnection {
    pub peer_addr: SocketAddr,
    pub stream: TcpStream,
}

/// Tracks in-flight and established TCP-allocation peer connections for one
/// client. Mirrors `RelayConn`'s role for UDP allocations but, per RFC 6062,
/// every peer gets its own second TCP socket to the server rather than
/// sharing the control connection's datagrams.
pub struct ConnectionManager {
    turn_serv_addr: String,
    username: Username,
    realm: Realm,
    integrity: MessageIntegrity,
    nonce: Nonce,
    peers: Mutex<HashMap<SocketAddr, ()>>,
}

impl ConnectionManager {
    pub fn new(
        turn_serv_addr: String,
        username: Username,
        realm: Realm,
        integrity: MessageIntegrity,
        nonce: Nonce,
    ) -> Self {
        ConnectionManager {
            turn_serv_addr,
            username,
            realm,
            integrity,
            nonce,
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// `sendConnectRequest(peer)`: issues a `Connect` request on the control
    /// connection via the caller's transaction machinery, then — on success
    /// — opens the second TCP socket and completes the `ConnectionBind`
    /// dance, returning the peer's raw byte stream.
    pub async fn connect<O: RelayConnObserver + Send + Sync>(
        &self,
        obs: &mut O,
        peer: SocketAddr,
    ) -> Result<PeerConnection, Error> {
        let mut msg = Message::new();
        msg.build(&[
            Box::new(TransactionId::new()),
            Box::new(MessageType::new(METHOD_CONNECT, CLASS_REQUEST)),
            Box::new(PeerAddress {
                ip: peer.ip(),
                port: peer.port(),
            }),
            Box::new(self.username.clone()),
            Box::new(self.realm.clone()),
            Box::new(self.nonce.clone()),
            Box::new(self.integrity.clone()),
            Box::new(FINGERPRINT),
        ])?;

        let tr_res = obs
            .perform_transaction(&msg, &self.turn_serv_addr, false)
            .await?;
        let res = tr_res.msg;

        if res.typ.class == CLASS_ERROR_RESPONSE {
            let mut code = ErrorCodeAttribute::default();
            return if code.get_from(&res).is_ok() {
                Err(Error::Other(format!("Connect failed: {code}")))
            } else {
                Err(Error::ErrConnectionTimeoutOrFailure)
            };
        }

        let mut conn_id = ConnectionId::default();
        conn_id
            .get_from(&res)
            .map_err(|_| Error::ErrConnectionIdNotFound)?;

        self.bind(peer, conn_id).await
    }

    /// Opens the second, freshly authenticated TCP socket to the server and
    /// sends `ConnectionBind(CONNECTION-ID)`. On success the socket carries
    /// the peer's bytes verbatim; no further STUN framing is applied to it.
    async fn bind(&self, peer: SocketAddr, conn_id: ConnectionId) -> Result<PeerConnection, Error> {
        let server_addr =
            SocketAddr::from_str(&self.turn_serv_addr).map_err(|e| Error::Other(e.to_string()))?;
        let mut stream = TcpStream::connect(server_addr)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;

        let mut msg = Message::new();
        msg.build(&[
            Box::new(TransactionId::new()),
            Box::new(MessageType::new(METHOD_CONNECTION_BIND, CLASS_REQUEST)),
            Box::new(conn_id),
            Box::new(self.username.clone()),
            Box::new(self.realm.clone()),
            Box::new(self.nonce.clone()),
            Box::new(self.integrity.clone()),
            Box::new(FINGERPRINT),
        ])?;

        stream
            .write_all(&msg.raw)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;

        let res = read_stun_message(&mut stream, CONNECTION_BIND_TIMEOUT).await?;

        if res.typ != MessageType::new(METHOD_CONNECTION_BIND, CLASS_SUCCESS_RESPONSE) {
            return Err(Error::ErrUnexpectedResponse);
        }

        self.peers.lock().await.insert(peer, ());

        Ok(PeerConnection {
            peer_addr: peer,
            stream,
        })
    }

    /// Completes the `ConnectionBind` dance for an unsolicited
    /// `ConnectionAttempt` indication the control connection observer
    /// chose to accept.
    pub async fn accept_connection_attempt(
        &self,
        peer: SocketAddr,
        conn_id: ConnectionId,
    ) -> Result<PeerConnection, Error> {
        self.bind(peer, conn_id).await
    }

    /// Removes a peer from the manager; called when its socket closes.
    pub async fn remove(&self, peer: &SocketAddr) {
        self.peers.lock().await.remove(peer);
    }

    pub async fn contains(&self, peer: &SocketAddr) -> bool {
        self.peers.lock().await.contains_key(peer)
    }
}

async fn read_stun_message(stream: &mut TcpStream, timeout: Duration) -> Result<Message, Error> {
    let mut header = [0u8; 20];
    tokio::time::timeout(timeout, stream.read_exact(&mut header))
        .await
        .map_err(|_| Error::ErrConnectionAttemptTimedOut)?
        .map_err(|e| Error::Other(e.to_string()))?;

    let msg_len = u16::from_be_bytes([header[2], header[3]]) as usize;
    let mut body = vec![0u8; msg_len];
    tokio::time::timeout(timeout, stream.read_exact(&mut body))
        .await
        .map_err(|_| Error::ErrConnectionAttemptTimedOut)?
        .map_err(|e| Error::Other(e.to_string()))?;

    let mut raw = Vec::with_capacity(20 + msg_len);
    raw.extend_from_slice(&header);
    raw.extend_from_slice(&body);

    let mut msg = Message::new();
    msg.raw = raw;
    msg.decode().map_err(|_| Error::ErrFailedToDecodeStun)?;
    Ok(msg)
}
