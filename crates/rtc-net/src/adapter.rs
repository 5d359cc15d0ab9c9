use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;

/// One link in a socket's sender/receiver chain. Outgoing `send` calls walk
/// toward the network (index 0); incoming bytes walk toward the
/// application (last index). Packetized protocols (HTTP parser, WebSocket
/// frame codec, STUN demultiplexer, TURN ChannelData prefix) install an
/// adapter that buffers and reassembles here.
#[async_trait]
pub trait SocketAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Transforms outgoing data one step closer to the wire.
    async fn on_send(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Transforms incoming data one step closer to the application.
    /// `Ok(None)` means the adapter consumed the bytes into an internal
    /// reassembly buffer and has nothing to emit yet (e.g. a partial HTTP
    /// header).
    async fn on_recv(&self, data: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// The ordered sender/receiver chain threaded through one [`crate::socket::Socket`].
/// Index 0 is closest to the network, the last index closest to the
/// application. Splicing a new middle link schedules the replaced adapter
/// onto a deferred-drop queue flushed on the next chain operation, so that
/// a callback frame already executing against the old adapter completes
/// safely.
pub struct AdapterChain {
    links: Mutex<Vec<Arc<dyn SocketAdapter>>>,
    pending_drop: Mutex<Vec<Arc<dyn SocketAdapter>>>,
}

impl AdapterChain {
    pub fn new() -> Self {
        AdapterChain {
            links: Mutex::new(Vec::new()),
            pending_drop: Mutex::new(Vec::new()),
        }
    }

    /// Appends an adapter at the application-most end of the chain.
    pub async fn push(&self, adapter: Arc<dyn SocketAdapter>) {
        self.flush_pending_drop().await;
        self.links.lock().await.push(adapter);
    }

    /// Replaces the adapter named `name` with `replacement` in place,
    /// preserving its position in the chain. The replaced adapter is
    /// scheduled for deferred drop rather than freed immediately.
    pub async fn replace(&self, name: &str, replacement: Arc<dyn SocketAdapter>) -> Result<()> {
        self.flush_pending_drop().await;
        let mut links = self.links.lock().await;
        let pos = links
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| crate::error::Error::ErrAdapterNotFound(name.to_owned()))?;
        let old = std::mem::replace(&mut links[pos], replacement);
        drop(links);
        self.pending_drop.lock().await.push(old);
        Ok(())
    }

    async fn flush_pending_drop(&self) {
        self.pending_drop.lock().await.clear();
    }

    /// Runs outgoing `data` through every link from the application end to
    /// the network end.
    pub async fn send_through(&self, data: &[u8]) -> Result<Vec<u8>> {
        let links = self.links.lock().await;
        let mut buf = data.to_vec();
        for adapter in links.iter().rev() {
            buf = adapter.on_send(&buf).await?;
        }
        Ok(buf)
    }

    /// Runs incoming `data` through every link from the network end to the
    /// application end. Returns `None` if some adapter is still buffering
    /// (e.g. a partial frame).
    pub async fn recv_through(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        let links = self.links.lock().await;
        let mut buf = data.to_vec();
        for adapter in links.iter() {
            match adapter.on_recv(&buf).await? {
                Some(next) => buf = next,
                None => return Ok(None),
            }
        }
        Ok(Some(buf))
    }

    pub async fn len(&self) -> usize {
        self.links.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for AdapterChain {
    fn default() -> Self {
        Self::new()
    }
}
