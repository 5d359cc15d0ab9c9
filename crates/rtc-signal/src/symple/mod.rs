pub mod message;
pub mod roster;


use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::sockio::{self, ClientState, SockIoConfig, SockIoObserver};
use crate::symple::message::{Message, MessageKind};
use crate::symple::roster::{PeerInfo, Roster};

/// Configuration table entry for the Symple client (6): host/port plus
/// reconnection policy forwarded to the underlying Socket.IO client, and
/// the identity/credential fields `announce()` sends.
pub struct SympleConfig {
    pub host: String,
    pub port: u16,
    pub reconnection: bool,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub user: String,
    pub name: String,
    pub kind: String,
    pub token: String,
}

/// Observer for application-level Symple events: a roster change, or an
/// inbound `message`/`event`/`command` addressed to us.
#[async_trait]
pub trait SympleObserver: Send + Sync {
    async fn on_announced(&self, self_id: &str);
    async fn on_roster_updated(&self, peer_id: &str);
    async fn on_message(&self, message: Message);
    async fn on_state_change(&self, state: ClientState);
}

/// Wraps [`crate::sockio::Client`] with Symple's presence/roster layer: an
/// `announce()` handshake, a `Roster`, and the presence-probe reply rule
/// from 4.9 and scenario 6 ("A must reply with its own presence addressed
/// to=B1").
pub struct Client {
    sockio: Arc<sockio::Client>,
    roster: Arc<Roster>,
    self_id: Arc<Mutex<Option<String>>>,
    observer: Arc<dyn SympleObserver>,
    config: SympleConfig,
}

struct Bridge {
    observer: Arc<dyn SympleObserver>,
    roster: Arc<Roster>,
    self_id: Arc<Mutex<Option<String>>>,
    sockio: Mutex<Option<Arc<sockio::Client>>>,
}

#[async_trait]
impl SockIoObserver for Bridge {
    async fn on_state_change(&self, state: ClientState) {
        self.observer.on_state_change(state).await;
    }

    async fn on_message(&self, data: String) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&data) {
            if let Ok(message) = Message::from_json(value) {
                self.handle_message(message).await;
            }
        }
    }

    async fn on_event(&self, _name: String, args: serde_json::Value) {
        if let Ok(message) = Message::from_json(args) {
            self.handle_message(message).await;
        }
    }
}

impl Bridge {
    async fn handle_message(&self, message: Message) {
        if message.kind == MessageKind::Presence {
            self.roster
                .update(PeerInfo {
                    id: message.from.clone(),
                    data: message.data.clone(),
                })
                .await;
            self.observer.on_roster_updated(&message.from).await;

            // Scenario 6: a probe must be answered with our own, non-probe
            // presence addressed back to the prober.
            if message.is_probe() {
                if let Some(self_id) = self.self_id.lock().await.clone() {
                    let mut reply = message.reply_to(MessageKind::Presence);
                    reply.from = self_id;
                    reply.probe = Some(false);
                    if let (Some(sockio), Ok(json)) = (self.sockio.lock().await.clone(), reply.to_json()) {
                        let _ = sockio.emit("message", json).await;
                    }
                }
            }
        }

        self.observer.on_message(message).await;
    }
}

impl Client {
    pub fn new(config: SympleConfig, observer: Arc<dyn SympleObserver>) -> Arc<Self> {
        let roster = Arc::new(Roster::new());
        let self_id = Arc::new(Mutex::new(None));
        let bridge = Arc::new(Bridge {
            observer: Arc::clone(&observer),
            roster: Arc::clone(&roster),
            self_id: Arc::clone(&self_id),
            sockio: Mutex::new(None),
        });

        let sockio_config = SockIoConfig {
            host: config.host.clone(),
            port: config.port,
            secure: false,
            reconnection: config.reconnection,
            reconnect_attempts: config.reconnect_attempts,
            reconnect_delay_ms: config.reconnect_delay_ms,
        };
        let sockio_client = sockio::Client::new(sockio_config, bridge.clone());
        // No task can have touched `bridge` yet (it was just constructed),
        // so this lock never contends.
        if let Ok(mut guard) = bridge.sockio.try_lock() {
            *guard = Some(Arc::clone(&sockio_client));
        }

        Arc::new(Client {
            sockio: sockio_client,
            roster,
            self_id,
            observer,
            config,
        })
    }

    pub fn roster(&self) -> Arc<Roster> {
        Arc::clone(&self.roster)
    }

    pub async fn self_id(&self) -> Option<String> {
        self.self_id.lock().await.clone()
    }

    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        self.sockio.connect().await
    }

    /// Posts identity + token, awaits the server's ack carrying our
    /// assigned peer id, then broadcasts a presence probe, per 4.9:
    /// "`announce()` posts identity + token, awaits a success response
    /// with the server-assigned peer id, then broadcasts a presence
    /// probe."
    pub async fn announce(self: &Arc<Self>) -> Result<String> {
        let payload = serde_json::json!({
            "user": self.config.user,
            "name": self.config.name,
            "type": self.config.kind,
            "token": self.config.token,
        });
        let ack = self.sockio.emit_with_ack("announce", payload).await?;
        let peer_id = ack
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::ErrSympleParse("announce ack missing id".to_owned()))?
            .to_owned();

        *self.self_id.lock().await = Some(peer_id.clone());
        self.observer.on_announced(&peer_id).await;

        let probe = Message::presence(peer_id.clone(), true).to_json()?;
        self.sockio.emit("message", probe).await?;

        Ok(peer_id)
    }

    pub async fn send(&self, message: &Message) -> Result<()> {
        self.sockio.emit("message", message.to_json()?).await
    }

    pub async fn close(&self) -> Result<()> {
        self.sockio.close().await
    }
}
