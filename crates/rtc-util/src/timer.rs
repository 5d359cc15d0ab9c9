use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// A cancellable, restartable one-shot or repeating timer. Grounds the
/// `Timer`-typed members (`_pingTimer`, `_pingTimeoutTimer`,
/// `_reconnectTimer`) used throughout the Socket.IO client and the
/// per-allocation/permission/channel expiry timers in TURN.
pub struct Timer {
    armed: Arc<AtomicBool>,
    cancel: Arc<Notify>,
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            armed: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(Notify::new()),
        }
    }

    /// Starts (or restarts) the timer. `on_fire` runs once, on the current
    /// task's runtime, after `delay` elapses, unless `stop()`/`restart()`
    /// cancels it first.
    pub fn start(&self, delay: Duration, on_fire: impl FnOnce() + Send + 'static) {
        self.cancel.notify_waiters(); // cancel any previous pending fire
        self.armed.store(true, Ordering::SeqCst);

        let armed = Arc::clone(&self.armed);
        let cancel = Arc::clone(&self.cancel);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if armed.swap(false, Ordering::SeqCst) {
                        on_fire();
                    }
                }
                _ = cancel.notified() => {}
            }
        });
    }

    pub fn restart(&self, delay: Duration, on_fire: impl FnOnce() + Send + 'static) {
        self.start(delay, on_fire);
    }

    pub fn stop(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.cancel.notify_waiters();
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
