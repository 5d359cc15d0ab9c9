pub mod packet;
pub mod transaction;

#[cfg(test)]
mod handshake_test;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rtc_net::socket::Socket;
use tokio::sync::Mutex;
use util::timer::Timer;

use crate::error::{Error, Result};
use crate::http::message::{Headers, RequestHead};
use crate::http::parser::{Parser, ParserEvent};
use crate::sockio::packet::{Packet, PacketKind};
use crate::sockio::transaction::TransactionTable;
use crate::ws::handshake::{accept_key, generate_key};
use crate::ws::{decode_frame, encode_frame, Frame, Opcode};

/// `ClientState` per 4.9: `Online` means authenticated/announced, which in
/// the base Socket.IO layer (without Symple on top) is reached the moment
/// the WebSocket upgrade completes and the first ping/pong round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Closed,
    Connecting,
    Connected,
    Online,
    Error,
}

/// Configuration table entry for the Symple/Socket.IO client.
pub struct SockIoConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub reconnection: bool,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for SockIoConfig {
    fn default() -> Self {
        SockIoConfig {
            host: "localhost".to_owned(),
            port: 80,
            secure: false,
            reconnection: true,
            reconnect_attempts: 10,
            reconnect_delay_ms: 1000,
        }
    }
}

/// The `{sessionId, pingInterval, pingTimeout}` triple a Socket.IO
/// handshake over HTTP returns, per 6: `sessionId:pingInterval:
/// pingTimeout:transports`.
#[derive(Debug, Clone)]
pub struct HandshakeInfo {
    pub session_id: String,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub transports: Vec<String>,
}

pub fn parse_handshake(body: &str) -> Result<HandshakeInfo> {
    let mut parts = body.trim().splitn(4, ':');
    let session_id = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::ErrSockIoParse("missing session id".to_owned()))?
        .to_owned();
    let ping_interval: u64 = parts
        .next()
        .ok_or_else(|| Error::ErrSockIoParse("missing ping interval".to_owned()))?
        .parse()
        .map_err(|_| Error::ErrSockIoParse("bad ping interval".to_owned()))?;
    let ping_timeout: u64 = parts
        .next()
        .ok_or_else(|| Error::ErrSockIoParse("missing ping timeout".to_owned()))?
        .parse()
        .map_err(|_| Error::ErrSockIoParse("bad ping timeout".to_owned()))?;
    let transports = parts
        .next()
        .unwrap_or("websocket")
        .split(',')
        .map(str::to_owned)
        .collect();

    Ok(HandshakeInfo {
        session_id,
        ping_interval: Duration::from_millis(ping_interval),
        ping_timeout: Duration::from_millis(ping_timeout),
        transports,
    })
}

/// Observer callbacks the base Socket.IO client dispatches to; `symple`
/// layers its own message parsing on top of `on_message`.
#[async_trait]
pub trait SockIoObserver: Send + Sync {
    async fn on_state_change(&self, state: ClientState);
    async fn on_message(&self, data: String);
    async fn on_event(&self, name: String, args: serde_json::Value);
}

/// Socket.IO client: handshakes over HTTP, opens a WebSocket, and pings
/// the server on `pingInterval` per 4.9. `announce`/roster semantics live
/// in [`crate::symple`], which wraps this client rather than duplicating
/// its transport handling.
pub struct Client {
    config: SockIoConfig,
    state: Mutex<ClientState>,
    socket: Mutex<Option<Arc<Socket>>>,
    handshake: Mutex<Option<HandshakeInfo>>,
    transactions: Arc<TransactionTable>,
    ping_timer: Timer,
    ping_timeout_timer: Timer,
    reconnect_timer: Timer,
    reconnect_attempt: std::sync::atomic::AtomicU32,
    observer: Arc<dyn SockIoObserver>,
    closing: AtomicBool,
}

impl Client {
    pub fn new(config: SockIoConfig, observer: Arc<dyn SockIoObserver>) -> Arc<Self> {
        Arc::new(Client {
            config,
            state: Mutex::new(ClientState::Closed),
            socket: Mutex::new(None),
            handshake: Mutex::new(None),
            transactions: TransactionTable::new(),
            ping_timer: Timer::new(),
            ping_timeout_timer: Timer::new(),
            reconnect_timer: Timer::new(),
            reconnect_attempt: std::sync::atomic::AtomicU32::new(0),
            observer,
            closing: AtomicBool::new(false),
        })
    }

    pub async fn state(&self) -> ClientState {
        *self.state.lock().await
    }

    async fn set_state(&self, state: ClientState) {
        *self.state.lock().await = state;
        self.observer.on_state_change(state).await;
    }

    /// Drives the HTTP handshake, then upgrades to a WebSocket and starts
    /// the ping loop. On success the client is `Online`.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        self.closing.store(false, Ordering::Release);
        self.set_state(ClientState::Connecting).await;

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket_addr: std::net::SocketAddr = tokio::net::lookup_host(&addr)
            .await?
            .next()
            .ok_or_else(|| Error::ErrWsHandshake(format!("could not resolve {addr}")))?;

        let handshake_socket = Arc::new(Socket::connect_tcp(socket_addr).await?);
        let mut req = RequestHead {
            method: "GET".to_owned(),
            uri: "/socket.io/1/".to_owned(),
            version: "HTTP/1.1".to_owned(),
            headers: Headers::new(),
        };
        req.headers.push("Host", &self.config.host);
        handshake_socket.send(&req.serialize(), None).await?;

        let mut parser = Parser::for_response();
        let mut body = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let read = handshake_socket.recv(&mut buf).await?;
            let events = match read {
                Some((data, _)) => parser.feed(&data)?,
                None => continue,
            };
            let mut done = false;
            for event in events {
                match event {
                    ParserEvent::Chunk(chunk) => body.extend_from_slice(&chunk),
                    ParserEvent::End => done = true,
                    _ => {}
                }
            }
            if done {
                break;
            }
        }
        handshake_socket.close().await?;

        let info = parse_handshake(&String::from_utf8_lossy(&body))?;

        let ws_uri = format!("/socket.io/1/websocket/{}", info.session_id);
        let ws_socket = Arc::new(Socket::connect_tcp(socket_addr).await?);
        self.upgrade_to_websocket(&ws_socket, &ws_uri).await?;

        *self.socket.lock().await = Some(ws_socket);
        *self.handshake.lock().await = Some(info.clone());
        self.set_state(ClientState::Connected).await;

        self.arm_ping_timer(info.ping_interval);
        self.set_state(ClientState::Online).await;
        Ok(())
    }

    async fn upgrade_to_websocket(&self, socket: &Arc<Socket>, uri: &str) -> Result<()> {
        let key = generate_key();
        let mut req = RequestHead {
            method: "GET".to_owned(),
            uri: uri.to_owned(),
            version: "HTTP/1.1".to_owned(),
            headers: Headers::new(),
        };
        req.headers.push("Host", &self.config.host);
        req.headers.push("Connection", "Upgrade");
        req.headers.push("Upgrade", "websocket");
        req.headers.push("Sec-WebSocket-Version", "13");
        req.headers.push("Sec-WebSocket-Key", &key);
        socket.send(&req.serialize(), None).await?;

        let mut parser = Parser::for_response();
        let mut buf = [0u8; 4096];
        loop {
            let read = socket.recv(&mut buf).await?;
            let data = match read {
                Some((data, _)) => data,
                None => continue,
            };
            let events = parser.feed(&data)?;
            let mut headers_seen = None;
            for event in events {
                if let ParserEvent::ResponseHeaders(head) = event {
                    headers_seen = Some(head);
                }
            }
            if let Some(head) = headers_seen {
                if head.status != 101 {
                    return Err(Error::ErrWsHandshake(format!(
                        "server refused upgrade: {}",
                        head.status
                    )));
                }
                let accept = head
                    .headers
                    .get("sec-websocket-accept")
                    .ok_or_else(|| Error::ErrWsHandshake("missing accept header".to_owned()))?;
                if accept != accept_key(&key) {
                    return Err(Error::ErrWsHandshake("accept key mismatch".to_owned()));
                }
                return Ok(());
            }
        }
    }

    fn arm_ping_timer(self: &Arc<Self>, interval: Duration) {
        let client = Arc::clone(self);
        self.ping_timer.start(interval, move || {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let _ = client.send_raw(&Packet::heartbeat().encode()).await;
                client.arm_ping_timeout();
            });
        });
    }

    fn arm_ping_timeout(self: &Arc<Self>) {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let timeout = client
                .handshake
                .lock()
                .await
                .as_ref()
                .map(|h| h.ping_timeout)
                .unwrap_or(Duration::from_secs(60));
            let timer_client = Arc::clone(&client);
            client.ping_timeout_timer.start(timeout, move || {
                let timer_client = Arc::clone(&timer_client);
                tokio::spawn(async move {
                    timer_client.on_transport_error().await;
                });
            });
        });
    }

    async fn on_transport_error(self: &Arc<Self>) {
        self.set_state(ClientState::Error).await;
        self.transactions.cancel_all().await;
        if self.config.reconnection && !self.closing.load(Ordering::Acquire) {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let attempt = self.reconnect_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.config.reconnect_attempts {
            return;
        }
        let delay = Duration::from_millis(self.config.reconnect_delay_ms * attempt as u64);
        let client = Arc::clone(self);
        self.reconnect_timer.start(delay, move || {
            tokio::spawn(async move {
                let _ = client.connect().await;
            });
        });
    }

    async fn send_raw(&self, encoded: &str) -> Result<()> {
        let socket = self.socket.lock().await;
        let socket = socket.as_ref().ok_or(Error::ErrClosed)?;
        let frame = Frame::text(encoded);
        socket.send(&encode_frame(&frame, true), None).await?;
        Ok(())
    }

    /// Emits an event without requesting an ack, e.g. a presence broadcast.
    pub async fn emit(&self, name: &str, args: serde_json::Value) -> Result<()> {
        self.send_raw(&Packet::event(name, args).encode()).await
    }

    /// Emits an event with an ack id and awaits the matching `Ack` packet,
    /// i.e. a full [`crate::sockio::transaction::TransactionTable`] round
    /// trip.
    pub async fn emit_with_ack(
        self: &Arc<Self>,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let id = self.transactions.next_ack_id();
        let packet = Packet::event_with_ack(id, name, args);
        self.send_raw(&packet.encode()).await?;
        self.transactions.wait_for(id).await
    }

    /// Feeds raw bytes read off the underlying socket (a WebSocket frame,
    /// possibly split across reads) and dispatches any complete packet to
    /// the observer or a waiting transaction.
    pub async fn on_recv(self: &Arc<Self>, data: &[u8]) -> Result<()> {
        let (frame, _) = match decode_frame(data, false)? {
            Some(f) => f,
            None => return Ok(()),
        };

        match frame.opcode {
            Opcode::Close => {
                self.on_transport_error().await;
            }
            Opcode::Ping => {
                self.send_raw(&Packet::heartbeat().encode()).await?;
            }
            Opcode::Pong | Opcode::Text | Opcode::Binary => {
                let text = String::from_utf8_lossy(&frame.payload).into_owned();
                let packet = Packet::decode(&text)?;
                self.dispatch_packet(packet).await?;
            }
            Opcode::Continuation => {}
        }
        Ok(())
    }

    async fn dispatch_packet(self: &Arc<Self>, packet: Packet) -> Result<()> {
        match packet.kind {
            PacketKind::Heartbeat => {
                self.ping_timeout_timer.stop();
            }
            PacketKind::Ack => {
                let (id, value) = packet.ack_payload()?;
                self.transactions.resolve(id, value).await;
            }
            PacketKind::Message => {
                if let Some(data) = packet.data {
                    self.observer.on_message(data).await;
                }
            }
            PacketKind::Event | PacketKind::JsonMessage => {
                if let Some(data) = packet.data {
                    let value: serde_json::Value = serde_json::from_str(&data)?;
                    let name = value
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_owned();
                    self.observer.on_event(name, value).await;
                }
            }
            PacketKind::Disconnect => {
                self.on_transport_error().await;
            }
            PacketKind::Connect | PacketKind::Error | PacketKind::Noop => {}
        }
        Ok(())
    }

    pub async fn close(self: &Arc<Self>) -> Result<()> {
        self.closing.store(true, Ordering::Release);
        self.ping_timer.stop();
        self.ping_timeout_timer.stop();
        self.reconnect_timer.stop();
        self.transactions.cancel_all().await;
        if let Some(socket) = self.socket.lock().await.take() {
            socket.close().await?;
        }
        self.set_state(ClientState::Closed).await;
        Ok(())
    }
}
