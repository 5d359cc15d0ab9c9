#[cfg(test)]
mod server_test;

mod handler;
mod util;

pub mod config;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::BoxFuture;
use stun::attributes::*;
use stun::error_code::*;
use stun::integrity::*;
use stun::message::*;
use stun::textattrs::*;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use util::Conn;

pub use config::{ConnConfig, ServerConfig};

use crate::allocation::allocation_manager::{Manager, ManagerConfig};
use crate::allocation::tcp_relay::TcpAllocation;
use crate::auth::AuthHandler;
use crate::error::*;
use crate::proto::chandata::ChannelData;
use crate::proto::connid::ConnectionId;
use crate::proto::peeraddr::PeerAddress;
use crate::proto::PROTO_TCP;
use self::util::*;

/// Notifies a client of an incoming peer connection on one of its RFC 6062
/// TCP allocations by sending a `ConnectionAttempt` indication.
type ConnectionAttemptNotifier = Arc<
    dyn Fn(Arc<TcpAllocation>, ConnectionId, SocketAddr) -> BoxFuture<'static, Result<()>>
        + Send
        + Sync,
>;

/// `Request` carries all the state needed to process one incoming datagram
/// (or, for a TCP control connection, one decoded STUN message/ChannelData
/// frame) and reply on the same socket.
pub struct Request {
    pub conn: Arc<dyn Conn + Send + Sync>,
    pub src_addr: SocketAddr,
    pub buff: Vec<u8>,

    pub(crate) allocation_manager: Arc<Manager>,
    pub(crate) nonces: Arc<Mutex<HashMap<String, Instant>>>,

    pub(crate) auth_handler: Arc<dyn AuthHandler + Send + Sync>,
    pub(crate) realm: String,
    pub(crate) channel_bind_timeout: Duration,
    pub(crate) tcp_connection_attempt_notifier: ConnectionAttemptNotifier,
}

impl Request {
    pub async fn handle_request(&mut self) -> Result<()> {
        log::debug!(
            "received {} bytes from {} on {}",
            self.buff.len(),
            self.src_addr,
            self.conn.local_addr().await?
        );

        if ChannelData::is_channel_data(&self.buff) {
            self.handle_data_packet().await
        } else {
            self.handle_turn_packet().await
        }
    }

    async fn handle_data_packet(&mut self) -> Result<()> {
        let mut c = ChannelData {
            raw: self.buff.clone(),
            ..Default::default()
        };
        c.decode()?;
        self.handle_channel_data(&c).await
    }

    async fn handle_turn_packet(&mut self) -> Result<()> {
        let mut m = Message {
            raw: self.buff.clone(),
            ..Default::default()
        };
        m.decode()?;

        self.process_message_handler(&m).await
    }

    async fn process_message_handler(&mut self, m: &Message) -> Result<()> {
        if m.typ.class == CLASS_INDICATION {
            match m.typ.method {
                METHOD_SEND => self.handle_send_indication(m).await,
                _ => Err(Error::ErrUnexpectedClass),
            }
        } else if m.typ.class == CLASS_REQUEST {
            match m.typ.method {
                METHOD_ALLOCATE => self.handle_allocate_request(m).await,
                METHOD_REFRESH => self.handle_refresh_request(m).await,
                METHOD_CREATE_PERMISSION => self.handle_create_permission_request(m).await,
                METHOD_CHANNEL_BIND => self.handle_channel_bind_request(m).await,
                METHOD_BINDING => self.handle_binding_request(m).await,
                METHOD_CONNECT => self.handle_connect_request(m).await,
                _ => Err(Error::ErrUnexpectedClass),
            }
        } else {
            Err(Error::ErrUnexpectedClass)
        }
    }

    /// Authenticates `m` via the long-term credential mechanism
    /// (RFC 5389 Section 10.2.2). Returns `Some((integrity, username))` on
    /// success; returns `None` after already sending a 401/438/400 response
    /// of its own, in which case the caller should stop processing.
    pub(crate) async fn authenticate_request(
        &mut self,
        m: &Message,
        calling_method: Method,
    ) -> Result<Option<(MessageIntegrity, Username)>> {
        if !m.contains(ATTR_MESSAGE_INTEGRITY) {
            self.respond_with_nonce(m, calling_method, CODE_UNAUTHORIZED)
                .await?;
            return Ok(None);
        }

        let mut nonce_attr = Nonce::new(ATTR_NONCE, String::new());
        let mut username_attr = Username::new(ATTR_USERNAME, String::new());
        let mut realm_attr = Realm::new(ATTR_REALM, String::new());
        let bad_request_msg = build_msg(
            m.transaction_id,
            MessageType::new(calling_method, CLASS_ERROR_RESPONSE),
            vec![Box::new(ErrorCodeAttribute {
                code: CODE_BAD_REQUEST,
                reason: vec![],
            })],
        );

        nonce_attr.get_from(m)?;

        let to_be_deleted = {
            let mut nonces = self.nonces.lock().await;
            let to_be_deleted = match nonces.get(&nonce_attr.text) {
                Some(created) => Instant::now().duration_since(*created) >= NONCE_LIFETIME,
                None => true,
            };
            if to_be_deleted {
                nonces.remove(&nonce_attr.text);
            }
            to_be_deleted
        };

        if to_be_deleted {
            self.respond_with_nonce(m, calling_method, CODE_STALE_NONCE)
                .await?;
            return Ok(None);
        }

        realm_attr.get_from(m)?;
        username_attr.get_from(m)?;

        let key = match self.auth_handler.auth_handle(
            &username_attr.text,
            &realm_attr.text,
            self.src_addr,
        ) {
            Ok(key) => key,
            Err(_) => {
                build_and_send_err(
                    &self.conn,
                    self.src_addr,
                    Error::ErrNoSuchUser,
                    &bad_request_msg,
                )
                .await?;
                return Ok(None);
            }
        };

        let mi = MessageIntegrity(key);
        if let Err(err) = mi.check(&mut m.clone()) {
            build_and_send_err(&self.conn, self.src_addr, err.into(), &bad_request_msg).await?;
            return Ok(None);
        }

        Ok(Some((mi, username_attr)))
    }

    async fn respond_with_nonce(
        &mut self,
        m: &Message,
        calling_method: Method,
        response_code: ErrorCode,
    ) -> Result<()> {
        let nonce = build_nonce()?;

        {
            let mut nonces = self.nonces.lock().await;
            if nonces.contains_key(&nonce) {
                return Err(Error::ErrDuplicatedNonce);
            }
            nonces.insert(nonce.clone(), Instant::now());
        }

        build_and_send(
            &self.conn,
            self.src_addr,
            &build_msg(
                m.transaction_id,
                MessageType::new(calling_method, CLASS_ERROR_RESPONSE),
                vec![
                    Box::new(ErrorCodeAttribute {
                        code: response_code,
                        reason: vec![],
                    }),
                    Box::new(Nonce::new(ATTR_NONCE, nonce)),
                    Box::new(Realm::new(ATTR_REALM, self.realm.clone())),
                ],
            ),
        )
        .await
    }
}

/// `Server` is a TURN server (RFC 5766, plus the RFC 6062 TCP-allocation
/// extension): it owns one [`Manager`] for every allocation made across all
/// of its listeners and dispatches incoming packets to [`Request`] handlers.
pub struct Server {
    allocation_manager: Arc<Manager>,
    nonces: Arc<Mutex<HashMap<String, Instant>>>,
    auth_handler: Arc<dyn AuthHandler + Send + Sync>,
    realm: String,
    channel_bind_timeout: Duration,
}

impl Server {
    /// Creates a new [`Server`] and spawns a read loop for every listener in
    /// `config.conn_configs`. Each listener gets its own `RelayAddressGenerator`,
    /// but all listeners share one allocation table.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let channel_bind_timeout = if config.channel_bind_timeout == Duration::from_secs(0) {
            Duration::from_secs(10 * 60)
        } else {
            config.channel_bind_timeout
        };

        let mut conn_configs = config.conn_configs;
        // Only the first listener's generator is used for allocations; a
        // deployment wanting distinct ranges per listener runs one Server
        // per listener instead.
        let first = conn_configs.remove(0);
        let conns: Vec<_> = std::iter::once(first.conn)
            .chain(conn_configs.into_iter().map(|cc| cc.conn))
            .collect();

        let server = Server {
            allocation_manager: Arc::new(Manager::new(ManagerConfig {
                relay_addr_generator: first.relay_addr_generator,
                alloc_close_notify: None,
            })),
            nonces: Arc::new(Mutex::new(HashMap::new())),
            auth_handler: config.auth_handler,
            realm: config.realm,
            channel_bind_timeout,
        };

        for conn in conns {
            server.serve_conn(conn);
        }

        Ok(server)
    }

    /// Closes every allocation currently tracked by the server, freeing
    /// their relay sockets. Listener read loops spawned by `new` exit on
    /// their own once their underlying conn is closed by the caller.
    pub async fn close(&self) -> Result<()> {
        self.allocation_manager.close().await
    }

    fn notifier(&self) -> ConnectionAttemptNotifier {
        Arc::new(|alloc, id, peer_addr| {
            Box::pin(async move {
                let m = stun::message::Message {
                    transaction_id: stun::agent::TransactionId::new(),
                    ..Default::default()
                };
                let mut msg = Message::new();
                msg.build(&[
                    Box::new(m),
                    Box::new(MessageType::new(METHOD_CONNECTION_ATTEMPT, CLASS_INDICATION)),
                    Box::new(id),
                    Box::new(PeerAddress {
                        ip: peer_addr.ip(),
                        port: peer_addr.port(),
                    }),
                ])?;
                let _ = alloc.turn_socket.send(&msg.raw).await?;
                Ok(())
            })
        })
    }

    /// Spawns a read loop that turns every datagram/frame received on `conn`
    /// into a [`Request`] and dispatches it.
    pub fn serve_conn(&self, conn: Arc<dyn Conn + Send + Sync>) {
        let allocation_manager = Arc::clone(&self.allocation_manager);
        let nonces = Arc::clone(&self.nonces);
        let auth_handler = Arc::clone(&self.auth_handler);
        let realm = self.realm.clone();
        let channel_bind_timeout = self.channel_bind_timeout;
        let tcp_connection_attempt_notifier = self.notifier();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            loop {
                let (n, src_addr) = match conn.recv_from(&mut buf).await {
                    Ok(r) => r,
                    Err(err) => {
                        log::debug!("listener closed: {err}");
                        return;
                    }
                };

                let mut req = Request {
                    conn: Arc::clone(&conn),
                    src_addr,
                    buff: buf[..n].to_vec(),
                    allocation_manager: Arc::clone(&allocation_manager),
                    nonces: Arc::clone(&nonces),
                    auth_handler: Arc::clone(&auth_handler),
                    realm: realm.clone(),
                    channel_bind_timeout,
                    tcp_connection_attempt_notifier: Arc::clone(&tcp_connection_attempt_notifier),
                };

                if let Err(err) = req.handle_request().await {
                    log::error!("failed to handle request from {src_addr}: {err}");
                }
            }
        });
    }

    /// Accepts incoming TCP control connections on `listener`: each
    /// connection is first checked for a `ConnectionBind`, which hands it
    /// off to [`crate::allocation::tcp_relay::splice`] against the matching
    /// pending peer connection; otherwise it is dispatched like any other
    /// [`Request`] source.
    pub fn serve_tcp_listener(&self, listener: tokio::net::TcpListener) {
        let allocation_manager = Arc::clone(&self.allocation_manager);
        let nonces = Arc::clone(&self.nonces);
        let auth_handler = Arc::clone(&self.auth_handler);
        let realm = self.realm.clone();
        let channel_bind_timeout = self.channel_bind_timeout;
        let tcp_connection_attempt_notifier = self.notifier();

        tokio::spawn(async move {
            loop {
                let (stream, src_addr) = match listener.accept().await {
                    Ok(r) => r,
                    Err(err) => {
                        log::debug!("tcp control listener closed: {err}");
                        return;
                    }
                };

                let allocation_manager = Arc::clone(&allocation_manager);
                let nonces = Arc::clone(&nonces);
                let auth_handler = Arc::clone(&auth_handler);
                let realm = realm.clone();
                let tcp_connection_attempt_notifier = Arc::clone(&tcp_connection_attempt_notifier);

                tokio::spawn(async move {
                    serve_tcp_control_connection(
                        stream,
                        src_addr,
                        allocation_manager,
                        nonces,
                        auth_handler,
                        realm,
                        channel_bind_timeout,
                        tcp_connection_attempt_notifier,
                    )
                    .await;
                });
            }
        });
    }

    /// Periodically evicts RFC 6062 peer connections that have been
    /// waiting longer than [`crate::allocation::tcp_relay::CONNECTION_BIND_TIMEOUT`]
    /// for a `ConnectionBind`. UDP allocations, permissions and channel
    /// binds evict themselves via their own per-entity timers and need no
    /// sweep.
    pub fn spawn_eviction_sweep(&self) {
        let allocation_manager = Arc::clone(&self.allocation_manager);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                interval.tick().await;
                allocation_manager.evict_expired_tcp_connections().await;
            }
        });
    }
}

/// Reads one STUN message off a freshly accepted TCP connection, and either
/// binds it to a pending RFC 6062 peer connection (entering raw-relay mode
/// for the rest of its life) or falls back to treating it as an ordinary
/// TURN-over-TCP control connection.
#[allow(clippy::too_many_arguments)]
async fn serve_tcp_control_connection(
    stream: tokio::net::TcpStream,
    src_addr: SocketAddr,
    allocation_manager: Arc<Manager>,
    nonces: Arc<Mutex<HashMap<String, Instant>>>,
    auth_handler: Arc<dyn AuthHandler + Send + Sync>,
    realm: String,
    channel_bind_timeout: Duration,
    tcp_connection_attempt_notifier: ConnectionAttemptNotifier,
) {
    let conn: Arc<dyn Conn + Send + Sync> = match util::conn::TcpConn::new(stream) {
        Ok(c) => Arc::new(c),
        Err(err) => {
            log::debug!("failed to wrap incoming tcp connection from {src_addr}: {err}");
            return;
        }
    };

    let mut buf = vec![0u8; 1500];
    loop {
        let n = match conn.recv(&mut buf).await {
            Ok(0) => return,
            Ok(n) => n,
            Err(err) => {
                log::debug!("tcp control connection from {src_addr} closed: {err}");
                return;
            }
        };

        let mut m = Message {
            raw: buf[..n].to_vec(),
            ..Default::default()
        };
        let mut req = Request {
            conn: Arc::clone(&conn),
            src_addr,
            buff: buf[..n].to_vec(),
            allocation_manager: Arc::clone(&allocation_manager),
            nonces: Arc::clone(&nonces),
            auth_handler: Arc::clone(&auth_handler),
            realm: realm.clone(),
            channel_bind_timeout,
            tcp_connection_attempt_notifier: Arc::clone(&tcp_connection_attempt_notifier),
        };

        if m.decode().is_ok()
            && m.typ.class == CLASS_REQUEST
            && m.typ.method == METHOD_CONNECTION_BIND
        {
            // RFC 6062 Section 6.2.1: this CONNECTION-ID only proves
            // anything once presented over an authenticated connection, the
            // same as every other request method.
            match req.authenticate_request(&m, METHOD_CONNECTION_BIND).await {
                Ok(Some(_)) => {
                    if try_bind_connection(&m, &conn, src_addr, &allocation_manager).await {
                        return; // Connection handed off to the relay splice task.
                    }
                }
                Ok(None) => {} // challenge or error response already sent
                Err(err) => {
                    log::error!("failed to authenticate connection bind from {src_addr}: {err}");
                }
            }
            continue;
        }

        if let Err(err) = req.handle_request().await {
            log::error!("failed to handle tcp request from {src_addr}: {err}");
        }
    }
}

/// RFC 6062 Section 6.2.1: validates `ConnectionBind`'s CONNECTION-ID
/// against every TCP allocation's pending table and, on a match, splices the
/// bound connection with its peer. Returns `true` if the connection was
/// handed off (the caller must stop reading from it).
async fn try_bind_connection(
    m: &Message,
    conn: &Arc<dyn Conn + Send + Sync>,
    src_addr: SocketAddr,
    allocation_manager: &Arc<Manager>,
) -> bool {
    let mut id = ConnectionId::default();
    if id.get_from(m).is_err() {
        return false;
    }

    let pending = allocation_manager.take_pending_tcp_connection(id).await;
    let Some((alloc, peer)) = pending else {
        let msg = build_msg(
            m.transaction_id,
            MessageType::new(METHOD_CONNECTION_BIND, CLASS_ERROR_RESPONSE),
            vec![Box::new(ErrorCodeAttribute {
                code: CODE_CONN_TIMEOUT_OR_FAILURE,
                reason: vec![],
            })],
        );
        let _ = build_and_send(conn, src_addr, &msg).await;
        return false;
    };

    let ack = build_msg(
        m.transaction_id,
        MessageType::new(METHOD_CONNECTION_BIND, CLASS_SUCCESS_RESPONSE),
        vec![],
    );
    if build_and_send(conn, src_addr, &ack).await.is_err() {
        return false;
    }

    let client_conn = Arc::clone(conn);
    tokio::spawn(async move {
        let _ = crate::allocation::tcp_relay::splice_conn(client_conn, peer.stream).await;
        let _ = alloc; // keep the allocation (and its relay listener) alive for the duration
    });

    true
}
