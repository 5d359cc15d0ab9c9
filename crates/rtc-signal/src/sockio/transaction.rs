use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};

use crate::error::{Error, Result};

/// Reliable-transport transaction default from 4.5: one attempt, no
/// retransmission, 10 s timeout. Socket.IO runs over a WebSocket, so unlike
/// `rtc-stun`/`rtc-turn`'s UDP transactions there is no backoff schedule
/// here — only a single deadline.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// States `{Waiting -> Running -> (Success | Failed | Cancelled)}` per the
/// transaction layer spec, collapsed to an enum since a Socket.IO
/// transaction has no separate dispatch phase between "sent" and
/// "waiting".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionState {
    Running,
    Success,
    Failed,
    Cancelled,
}

/// One outstanding ack: the response is matched to the request purely by
/// its ack id (no address check, unlike STUN transactions), per 4.5's
/// "Socket.IO transactions match by ack id."
struct Pending {
    tx: Option<oneshot::Sender<Result<serde_json::Value>>>,
}

/// Tracks every ack id awaiting its response for one Socket.IO client.
/// Grounded in the original `socketio::Transaction` type, which likewise
/// keys by ack id rather than address.
#[derive(Default)]
pub struct TransactionTable {
    pending: Mutex<HashMap<u64, Pending>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl TransactionTable {
    pub fn new() -> Arc<Self> {
        Arc::new(TransactionTable {
            pending: Mutex::new(HashMap::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
        })
    }

    pub fn next_ack_id(&self) -> u64 {
        self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }

    /// Registers a new pending transaction for `id` and returns a future
    /// that resolves once [`TransactionTable::resolve`] is called with a
    /// matching id, or times out after `DEFAULT_TIMEOUT`.
    pub async fn wait_for(self: &Arc<Self>, id: u64) -> Result<serde_json::Value> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, Pending { tx: Some(tx) });

        let result = tokio::time::timeout(DEFAULT_TIMEOUT, rx).await;
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(inner)) => inner,
            Ok(Err(_)) => Err(Error::ErrCancelled),
            Err(_) => Err(Error::ErrTimeout),
        }
    }

    /// Delivers the ack payload for `id`, transitioning its transaction to
    /// `Success`. A no-op if no transaction is waiting on that id (a late
    /// or duplicate ack).
    pub async fn resolve(&self, id: u64, payload: serde_json::Value) {
        if let Some(mut pending) = self.pending.lock().await.remove(&id) {
            if let Some(tx) = pending.tx.take() {
                let _ = tx.send(Ok(payload));
            }
        }
    }

    /// Cancels every outstanding transaction, e.g. on connection close.
    /// Idempotent: cancelling an already-empty table is a no-op, and a
    /// transaction already resolved is simply absent from the table.
    pub async fn cancel_all(&self) {
        let mut pending = self.pending.lock().await;
        for (_, mut p) in pending.drain() {
            if let Some(tx) = p.tx.take() {
                let _ = tx.send(Err(Error::ErrCancelled));
            }
        }
    }
}

#[cfg(test)]
mod transaction_test {
    use super::*;

    #[tokio::test]
    async fn test_resolves_a_pending_transaction_by_ack_id() {
        let table = TransactionTable::new();
        let id = table.next_ack_id();

        let table2 = Arc::clone(&table);
        let waiter = tokio::spawn(async move { table2.wait_for(id).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        table.resolve(id, serde_json::json!({"ok": true})).await;

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_cancel_all_fails_every_outstanding_transaction() {
        let table = TransactionTable::new();
        let id = table.next_ack_id();

        let table2 = Arc::clone(&table);
        let waiter = tokio::spawn(async move { table2.wait_for(id).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        table.cancel_all().await;

        assert!(matches!(waiter.await.unwrap(), Err(Error::ErrCancelled)));
    }

    #[tokio::test]
    async fn test_double_cancel_is_idempotent() {
        let table = TransactionTable::new();
        table.cancel_all().await;
        table.cancel_all().await;
    }
}
