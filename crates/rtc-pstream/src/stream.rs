#[cfg(test)]
mod stream_test;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use crate::adapter::{AdapterRole, StreamAdapter};
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketKind};

/// `PacketStream` lifecycle. `reset()` loops back to `Active` without
/// recreating adapters; every other arrow is one-way. `Closing`/`Closed`
/// are terminal, and `Error` only reachable from `Active` on a processor
/// failure (cancels the rest of the dispatch for that packet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    None,
    Active,
    Stopped,
    Closing,
    Closed,
    Error,
}

struct Inner {
    state: State,
    adapters: BTreeMap<i32, Vec<Box<dyn StreamAdapter>>>,
    /// Adapters detached mid-dispatch; freed on the next `write()` so that
    /// an in-flight dispatch frame never observes a freed adapter, mirroring
    /// the socket adapter chain's deferred-destruction contract.
    pending_drop: Vec<Box<dyn StreamAdapter>>,
    base_time: Duration,
    dispatching: bool,
}

/// Ordered pipeline connecting sources to sinks through priority-ordered
/// processors. See the component design's packet-stream section: packets
/// entering a non-`Active` stream are dropped, processors run in ascending
/// `order()`, and `ready` gates safe adapter-list mutation until the
/// current dispatch iteration completes.
pub struct PacketStream {
    inner: Arc<Mutex<Inner>>,
    ready: Arc<Notify>,
}

impl PacketStream {
    pub fn new() -> Self {
        PacketStream {
            inner: Arc::new(Mutex::new(Inner {
                state: State::None,
                adapters: BTreeMap::new(),
                pending_drop: Vec::new(),
                base_time: Duration::from_secs(0),
                dispatching: false,
            })),
            ready: Arc::new(Notify::new()),
        }
    }

    pub async fn state(&self) -> State {
        self.inner.lock().await.state
    }

    /// Attaches an adapter at its own `order()`. Multiple adapters may
    /// share an order; they run in attachment order among themselves.
    pub async fn attach(&self, adapter: Box<dyn StreamAdapter>) {
        let mut inner = self.inner.lock().await;
        inner
            .adapters
            .entry(adapter.order())
            .or_default()
            .push(adapter);
    }

    /// Detaches the first adapter named `name`, scheduling it for deferred
    /// drop rather than freeing it immediately.
    pub async fn detach(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let mut found = None;
        for (order, bucket) in inner.adapters.iter_mut() {
            if let Some(pos) = bucket.iter().position(|a| a.name() == name) {
                found = Some((*order, pos));
                break;
            }
        }
        let (order, pos) = found.ok_or_else(|| Error::ErrAdapterNotFound(name.to_owned()))?;
        let removed = inner.adapters.get_mut(&order).unwrap().remove(pos);
        inner.pending_drop.push(removed);
        Ok(())
    }

    /// Starts sources and arms processors. Valid from `None` or `Stopped`.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            State::None | State::Stopped => {
                inner.state = State::Active;
                Ok(())
            }
            State::Active => Ok(()),
            _ => Err(Error::ErrAlreadyClosed),
        }
    }

    /// Stops the pipeline. Waits for any in-flight dispatch to complete
    /// before returning, so a caller that immediately mutates the adapter
    /// list afterward never races a running `write()`.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == State::Closed || inner.state == State::Closing {
                return Err(Error::ErrAlreadyClosed);
            }
            inner.state = State::Stopped;
        }
        self.wait_ready().await;
        Ok(())
    }

    /// Restarts timestamp and sequencing state without recreating
    /// processors, then re-enters `Active`.
    pub async fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == State::Closed || inner.state == State::Closing {
            return Err(Error::ErrAlreadyClosed);
        }
        inner.base_time = Duration::from_secs(0);
        inner.state = State::Active;
        Ok(())
    }

    /// Terminal. Idempotent: a second `close()` is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == State::Closed {
            return Ok(());
        }
        inner.state = State::Closing;
        inner.pending_drop.extend(
            inner
                .adapters
                .split_off(&i32::MIN)
                .into_values()
                .flatten(),
        );
        inner.state = State::Closed;
        Ok(())
    }

    /// Resolves once the stream is not mid-dispatch. A stopping caller
    /// awaits this before mutating the adapter list.
    pub async fn ready(&self) {
        self.wait_ready().await;
    }

    async fn wait_ready(&self) {
        loop {
            {
                let inner = self.inner.lock().await;
                if !inner.dispatching {
                    return;
                }
            }
            self.ready.notified().await;
        }
    }

    /// Sends one packet through the processor chain to whichever sinks
    /// accept it. Drops the packet (no error) if the stream is `Stopped`,
    /// `Closing`, or `Closed`; `Error` aborts dispatch of *this* packet
    /// and transitions no further state.
    pub async fn write(&self, mut packet: Packet) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.flush_pending_drop(&mut inner);

        match inner.state {
            State::Active => {}
            State::Error => return Err(Error::ErrStreamInError),
            _ => return Err(Error::ErrSourceStopped),
        }

        inner.dispatching = true;
        let mut accepted_by_any = false;
        let mut rejected = false;

        let orders: Vec<i32> = inner.adapters.keys().copied().collect();
        'outer: for order in orders {
            let len = inner.adapters.get(&order).map(|v| v.len()).unwrap_or(0);
            for idx in 0..len {
                let accepts = {
                    let bucket = match inner.adapters.get(&order) {
                        Some(b) => b,
                        None => continue,
                    };
                    match bucket.get(idx) {
                        Some(a) => a.accepts(&packet.kind),
                        None => continue,
                    }
                };
                if !accepts {
                    continue;
                }
                accepted_by_any = true;

                let result = {
                    let bucket = inner.adapters.get_mut(&order).unwrap();
                    let adapter = &mut bucket[idx];
                    adapter.process(packet.clone()).await
                };

                match result {
                    Ok(Some(next)) => packet = next,
                    Ok(None) => {
                        // Sink consumed it, or a processor intentionally
                        // dropped it: stop walking the chain.
                        break 'outer;
                    }
                    Err(err) => {
                        inner.state = State::Error;
                        inner.dispatching = false;
                        self.ready.notify_waiters();
                        return Err(Error::ErrPipelineError(err.to_string()));
                    }
                }
            }
        }

        if !accepted_by_any {
            rejected = true;
        }

        inner.dispatching = false;
        self.ready.notify_waiters();

        if rejected {
            return Err(Error::ErrAdapterRejected);
        }
        Ok(())
    }

    fn flush_pending_drop(&self, inner: &mut Inner) {
        inner.pending_drop.clear();
    }

    /// Number of attached adapters with the given role, for diagnostics
    /// and tests.
    pub async fn count(&self, role: AdapterRole) -> usize {
        let inner = self.inner.lock().await;
        inner
            .adapters
            .values()
            .flatten()
            .filter(|a| a.role() == role)
            .count()
    }
}

impl Default for PacketStream {
    fn default() -> Self {
        Self::new()
    }
}
