use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs a callback once per loop iteration while armed. The original
/// reactor ran idlers between I/O polls; here an `Idler` is driven
/// explicitly by whoever owns the surrounding `tokio::select!` loop
/// (there is no implicit "idle" phase in a Tokio runtime), by calling
/// `tick()` once per loop pass when `armed()` is true.
pub struct Idler {
    armed: AtomicBool,
}

impl Idler {
    pub fn new() -> Self {
        Idler {
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn tick(&self, on_idle: impl FnOnce()) {
        if self.armed() {
            on_idle();
        }
    }
}

impl Default for Idler {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedIdler = Arc<Idler>;
