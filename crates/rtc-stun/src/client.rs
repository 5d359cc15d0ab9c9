
use std::collections::HashMap;
use std::io::BufReader;
use std::marker::{Send, Sync};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use util::Conn;

use crate::agent::*;
use crate::error::*;
use crate::message::*;

/// Resolution of the RTO collector ticker. Transaction deadlines are only
/// ever as precise as this.
const DEFAULT_TIMEOUT_RATE: Duration = Duration::from_millis(5);

/// RFC 5389 retransmission timeout: starting interval, doubled up to a cap
/// of 1600 ms, for `DEFAULT_MAX_ATTEMPTS` retransmissions, followed by one
/// final wait (`FINAL_WAIT`) for a straggling response before the
/// transaction is declared timed out.
const DEFAULT_RTO: Duration = Duration::from_millis(100);
const RTO_CAP_SHIFT: u32 = 4; // 100ms << 4 == 1600ms
const DEFAULT_MAX_ATTEMPTS: u32 = 7;
const FINAL_WAIT: Duration = Duration::from_secs(8);
const DEFAULT_MAX_BUFFER_SIZE: usize = 8;

fn backoff(base: Duration, attempt: u32) -> Duration {
    base * (1u32 << attempt.min(RTO_CAP_SHIFT))
}

/// Collector calls `ClientAgent::Collect` with constant rate. The simple
/// implementation is a ticker which fires on each tick.
pub trait Collector {
    fn start(
        &mut self,
        rate: Duration,
        client_agent_tx: Arc<mpsc::Sender<ClientAgent>>,
    ) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

#[derive(Default)]
struct TickerCollector {
    close_tx: Option<mpsc::Sender<()>>,
}

impl Collector for TickerCollector {
    fn start(
        &mut self,
        rate: Duration,
        client_agent_tx: Arc<mpsc::Sender<ClientAgent>>,
    ) -> Result<()> {
        let (close_tx, mut close_rx) = mpsc::channel(1);
        self.close_tx = Some(close_tx);

        tokio::spawn(async move {
            let mut interval = time::interval(rate);

            loop {
                tokio::select! {
                    _ = close_rx.recv() => break,
                    _ = interval.tick() => {
                        if client_agent_tx.send(ClientAgent::Collect(Instant::now())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.close_tx.is_none() {
            return Err(Error::ErrCollectorClosed);
        }
        self.close_tx.take();
        Ok(())
    }
}

/// A transaction in progress on the client side. Concurrent access is
/// invalid; it only ever lives inside `Client::start`'s single task.
#[derive(Clone)]
pub struct ClientTransaction {
    pub(crate) id: TransactionId,
    attempt: u32,
    /// Set once the transaction has exhausted its retransmissions and is
    /// waiting out `FINAL_WAIT` for a straggler before giving up.
    final_wait: bool,
    handler: Handler,
    rto: Duration,
    raw: Vec<u8>,
}

impl ClientTransaction {
    fn next_timeout(&self, now: Instant) -> Instant {
        if self.final_wait {
            now + FINAL_WAIT
        } else {
            now + backoff(self.rto, self.attempt)
        }
    }
}

struct ClientSettings {
    buffer_size: usize,
    rto: Duration,
    rto_rate: Duration,
    max_attempts: u32,
    closed: bool,
    collector: Option<Box<dyn Collector + Send>>,
    c: Option<Arc<dyn Conn + Send + Sync>>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        ClientSettings {
            buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            rto: DEFAULT_RTO,
            rto_rate: DEFAULT_TIMEOUT_RATE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            closed: false,
            collector: None,
            c: None,
        }
    }
}

#[derive(Default)]
pub struct ClientBuilder {
    settings: ClientSettings,
}

impl ClientBuilder {
    pub fn new() -> Self {
        ClientBuilder {
            settings: ClientSettings::default(),
        }
    }

    /// Sets the base RTO as defined in the STUN RFC.
    pub fn with_rto(mut self, rto: Duration) -> Self {
        self.settings.rto = rto;
        self
    }

    /// Sets the RTO collector's timer resolution.
    pub fn with_timeout_rate(mut self, d: Duration) -> Self {
        self.settings.rto_rate = d;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.settings.buffer_size = buffer_size;
        self
    }

    pub fn with_collector(mut self, coll: Box<dyn Collector + Send>) -> Self {
        self.settings.collector = Some(coll);
        self
    }

    pub fn with_conn(mut self, conn: Arc<dyn Conn + Send + Sync>) -> Self {
        self.settings.c = Some(conn);
        self
    }

    /// Disables retransmission: a single attempt waits the reliable-
    /// transport default of 10s. Useful for TCP/TLS connections where the
    /// transport itself handles retransmission.
    pub fn with_no_retransmit(mut self) -> Self {
        self.settings.max_attempts = 0;
        self.settings.rto = Duration::from_secs(10);
        self
    }

    pub fn build(self) -> Result<Client> {
        if self.settings.c.is_none() {
            return Err(Error::ErrNoConnection);
        }

        let client = Client {
            settings: self.settings,
            ..Default::default()
        }
        .run()?;

        Ok(client)
    }
}

/// Simulates a "connection" to a STUN/TURN-STUN server: owns retransmission
/// and matches inbound messages to pending transactions by transaction id.
#[derive(Default)]
pub struct Client {
    settings: ClientSettings,
    close_tx: Option<mpsc::Sender<()>>,
    client_agent_tx: Option<Arc<mpsc::Sender<ClientAgent>>>,
    handler_tx: Option<Arc<mpsc::UnboundedSender<Event>>>,
}

impl Client {
    async fn read_until_closed(
        mut close_rx: mpsc::Receiver<()>,
        c: Arc<dyn Conn + Send + Sync>,
        client_agent_tx: Arc<mpsc::Sender<ClientAgent>>,
    ) {
        let mut buf = vec![0; 1024];

        loop {
            tokio::select! {
                _ = close_rx.recv() => return,
                res = c.recv(&mut buf) => {
                    if let Ok(n) = res {
                        let mut msg = Message::new();
                        let mut reader = BufReader::new(&buf[..n]);
                        if msg.read_from(&mut reader).is_err() {
                            continue;
                        }
                        if client_agent_tx.send(ClientAgent::Process(msg)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    fn insert(&mut self, ct: ClientTransaction) -> Result<()> {
        if self.settings.closed {
            return Err(Error::ErrClientClosed);
        }
        if let Some(handler_tx) = &self.handler_tx {
            handler_tx.send(Event {
                event_type: EventType::Insert(ct),
                ..Default::default()
            })?;
        }
        Ok(())
    }

    fn remove(&mut self, id: TransactionId) -> Result<()> {
        if self.settings.closed {
            return Err(Error::ErrClientClosed);
        }
        if let Some(handler_tx) = &self.handler_tx {
            handler_tx.send(Event {
                event_type: EventType::Remove(id),
                ..Default::default()
            })?;
        }
        Ok(())
    }

    fn start(
        conn: Option<Arc<dyn Conn + Send + Sync>>,
        mut handler_rx: mpsc::UnboundedReceiver<Event>,
        client_agent_tx: Arc<mpsc::Sender<ClientAgent>>,
        mut t: HashMap<TransactionId, ClientTransaction>,
        max_attempts: u32,
    ) {
        tokio::spawn(async move {
            while let Some(event) = handler_rx.recv().await {
                match event.event_type {
                    EventType::Close => break,
                    EventType::Insert(ct) => {
                        t.entry(ct.id).or_insert(ct);
                    }
                    EventType::Remove(id) => {
                        t.remove(&id);
                    }
                    EventType::Callback(id) => {
                        let mut ct = match t.remove(&id) {
                            Some(ct) => ct,
                            None => continue,
                        };

                        if event.event_body.is_ok() || ct.final_wait {
                            if let Some(handler) = ct.handler {
                                let _ = handler.send(event);
                            }
                            continue;
                        }

                        if ct.attempt >= max_attempts {
                            // Exhausted retransmissions: wait once more for
                            // a straggling response instead of giving up
                            // immediately.
                            ct.final_wait = true;
                            let timeout = ct.next_timeout(Instant::now());
                            t.insert(id, ct);
                            if client_agent_tx
                                .send(ClientAgent::Start(id, timeout))
                                .await
                                .is_err()
                            {
                                if let Some(ct) = t.remove(&id) {
                                    if let Some(handler) = ct.handler {
                                        let _ = handler.send(event);
                                    }
                                }
                            }
                            continue;
                        }

                        ct.attempt += 1;
                        let raw = ct.raw.clone();
                        let timeout = ct.next_timeout(Instant::now());
                        t.insert(id, ct);

                        if client_agent_tx
                            .send(ClientAgent::Start(id, timeout))
                            .await
                            .is_err()
                        {
                            if let Some(ct) = t.remove(&id) {
                                if let Some(handler) = ct.handler {
                                    let _ = handler.send(event);
                                }
                            }
                            continue;
                        }

                        if let Some(c) = &conn {
                            if c.send(&raw).await.is_err() {
                                let _ = client_agent_tx.send(ClientAgent::Stop(id)).await;
                                if let Some(ct) = t.remove(&id) {
                                    if let Some(handler) = ct.handler {
                                        let _ = handler.send(event);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
    }

    /// Stops the internal connection and agent.
    pub async fn close(&mut self) -> Result<()> {
        if self.settings.closed {
            return Err(Error::ErrClientClosed);
        }
        self.settings.closed = true;

        if let Some(collector) = &mut self.settings.collector {
            let _ = collector.close();
        }
        self.settings.collector.take();

        self.close_tx.take();
        if let Some(client_agent_tx) = &self.client_agent_tx {
            let _ = client_agent_tx.send(ClientAgent::Close).await;
        }
        self.client_agent_tx.take();

        if let Some(c) = self.settings.c.take() {
            c.close().await?;
        }

        Ok(())
    }

    fn run(mut self) -> Result<Self> {
        let (close_tx, close_rx) = mpsc::channel(1);
        let (client_agent_tx, client_agent_rx) = mpsc::channel(self.settings.buffer_size);
        let (handler_tx, handler_rx) = mpsc::unbounded_channel();
        let t: HashMap<TransactionId, ClientTransaction> = HashMap::new();

        let client_agent_tx = Arc::new(client_agent_tx);
        let handler_tx = Arc::new(handler_tx);
        self.client_agent_tx = Some(Arc::clone(&client_agent_tx));
        self.handler_tx = Some(Arc::clone(&handler_tx));
        self.close_tx = Some(close_tx);

        let conn = match &self.settings.c {
            Some(conn) => Arc::clone(conn),
            None => return Err(Error::ErrNoConnection),
        };

        Client::start(
            self.settings.c.clone(),
            handler_rx,
            Arc::clone(&client_agent_tx),
            t,
            self.settings.max_attempts,
        );

        let agent = Agent::new(Some(Arc::clone(&handler_tx)));
        tokio::spawn(async move { Agent::run(agent, client_agent_rx).await });

        if self.settings.collector.is_none() {
            self.settings.collector = Some(Box::<TickerCollector>::default());
        }
        if let Some(collector) = &mut self.settings.collector {
            collector.start(self.settings.rto_rate, Arc::clone(&client_agent_tx))?;
        }

        tokio::spawn(async move {
            Client::read_until_closed(close_rx, conn, client_agent_tx).await
        });

        Ok(self)
    }

    pub async fn send(&mut self, m: &Message, handler: Handler) -> Result<()> {
        if self.settings.closed {
            return Err(Error::ErrClientClosed);
        }

        let has_handler = handler.is_some();

        if handler.is_some() {
            let t = ClientTransaction {
                id: m.transaction_id,
                attempt: 0,
                final_wait: false,
                handler,
                rto: self.settings.rto,
                raw: m.raw.clone(),
            };
            let d = t.next_timeout(Instant::now());
            self.insert(t)?;

            if let Some(client_agent_tx) = &self.client_agent_tx {
                client_agent_tx
                    .send(ClientAgent::Start(m.transaction_id, d))
                    .await?;
            }
        }

        if let Some(c) = &self.settings.c {
            let result = c.send(&m.raw).await;
            if result.is_err() && has_handler {
                self.remove(m.transaction_id)?;
                if let Some(client_agent_tx) = &self.client_agent_tx {
                    client_agent_tx
                        .send(ClientAgent::Stop(m.transaction_id))
                        .await?;
                }
            } else if let Err(err) = result {
                return Err(Error::Other(err.to_string()));
            }
        }

        Ok(())
    }
}
