#[cfg(test)]
mod agent_test;

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::client::ClientTransaction;
use crate::error::*;
use crate::message::*;

#[derive(PartialEq, Eq, Hash, Copy, Clone, Default, Debug)]
pub struct TransactionId(pub(crate) [u8; TRANSACTION_ID_SIZE]);

impl TransactionId {
    /// Returns a new random transaction ID.
    pub fn new() -> Self {
        let mut b = TransactionId([0u8; TRANSACTION_ID_SIZE]);
        rand::thread_rng().fill(&mut b.0);
        b
    }
}

impl Setter for TransactionId {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.transaction_id = *self;
        m.write_transaction_id();
        Ok(())
    }
}

/// Commands accepted by `Agent::run`'s event loop. `Client` owns the
/// sending half of this channel.
pub enum ClientAgent {
    Process(Message),
    Start(TransactionId, Instant),
    Stop(TransactionId),
    Collect(Instant),
    Close,
}

/// What happened to a transaction previously registered with `start`.
#[derive(Clone)]
pub enum EventType {
    Close,
    Insert(ClientTransaction),
    Remove(TransactionId),
    Callback(TransactionId),
}

/// Delivered to a transaction's handler. `event_body` carries the matched
/// response on success or the reason it did not arrive.
#[derive(Clone)]
pub struct Event {
    pub event_type: EventType,
    pub event_body: Result<Message>,
}

impl Default for Event {
    fn default() -> Self {
        Event {
            event_type: EventType::Close,
            event_body: Err(Error::ErrTransactionNotExists),
        }
    }
}

/// Handler is notified of transaction state changes. `None` discards every
/// event (used for fire-and-forget indications).
pub type Handler = Option<Arc<mpsc::UnboundedSender<Event>>>;

pub fn noop_handler() -> Handler {
    None
}

struct AgentTransaction {
    deadline: Instant,
}

const AGENT_COLLECT_CAP: usize = 100;

/// Low-level abstraction over the transaction list: registers deadlines,
/// matches inbound messages by transaction id, and reports timeouts on
/// `collect`. Intended to be driven either directly (tests) or by
/// `Agent::run` reading commands off a channel (the `Client`'s usage).
pub struct Agent {
    transactions: HashMap<TransactionId, AgentTransaction>,
    closed: bool,
    handler: Handler,
}

impl Agent {
    pub fn new(handler: Handler) -> Self {
        Agent {
            transactions: HashMap::new(),
            closed: false,
            handler,
        }
    }

    fn emit(&self, id: TransactionId, body: Result<Message>) -> Result<()> {
        if let Some(handler) = &self.handler {
            handler.send(Event {
                event_type: EventType::Callback(id),
                event_body: body,
            })?;
        }
        Ok(())
    }

    /// Matches `message` to a pending transaction (if any) and notifies
    /// the handler either way.
    pub fn process(&mut self, message: Message) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        let id = message.transaction_id;
        self.transactions.remove(&id);
        self.emit(id, Ok(message))
    }

    /// Registers a transaction with the given deadline.
    pub fn start(&mut self, id: TransactionId, deadline: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        if self.transactions.contains_key(&id) {
            return Err(Error::ErrTransactionExists);
        }
        self.transactions.insert(id, AgentTransaction { deadline });
        Ok(())
    }

    /// Stops a transaction, notifying its handler with `ErrTransactionStopped`.
    pub fn stop(&mut self, id: TransactionId) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        if self.transactions.remove(&id).is_some() {
            self.emit(id, Err(Error::ErrTransactionStopped))
        } else {
            Err(Error::ErrTransactionNotExists)
        }
    }

    /// Expires every transaction whose deadline is before `gc_time`.
    pub fn collect(&mut self, gc_time: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        let mut expired = Vec::with_capacity(AGENT_COLLECT_CAP);
        for (id, t) in &self.transactions {
            if t.deadline < gc_time {
                expired.push(*id);
            }
        }
        for id in expired {
            self.transactions.remove(&id);
            self.emit(id, Err(Error::ErrTransactionTimeOut))?;
        }
        Ok(())
    }

    pub fn set_handler(&mut self, h: Handler) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        self.handler = h;
        Ok(())
    }

    /// Terminates every in-flight transaction with `ErrAgentClosed` and
    /// renders the agent closed. Idempotent calls return `ErrAgentClosed`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrAgentClosed);
        }
        for id in self.transactions.keys().copied().collect::<Vec<_>>() {
            self.emit(id, Err(Error::ErrAgentClosed))?;
        }
        self.transactions.clear();
        self.closed = true;
        self.handler = noop_handler();
        Ok(())
    }

    /// Drains `rx`, applying each command, until `Close` arrives or the
    /// channel is dropped.
    pub async fn run(mut agent: Agent, mut rx: mpsc::Receiver<ClientAgent>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                ClientAgent::Process(msg) => {
                    let _ = agent.process(msg);
                }
                ClientAgent::Start(id, deadline) => {
                    let _ = agent.start(id, deadline);
                }
                ClientAgent::Stop(id) => {
                    let _ = agent.stop(id);
                }
                ClientAgent::Collect(now) => {
                    let _ = agent.collect(now);
                }
                ClientAgent::Close => {
                    let _ = agent.close();
                    break;
                }
            }
        }
    }
}
