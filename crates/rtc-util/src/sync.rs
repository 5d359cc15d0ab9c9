use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::{Error, Result};

/// A plain synchronous mutex, used on the rare fast path where holding a
/// `tokio::sync::Mutex` across an `.await` would be wrong (e.g. guarding a
/// cached error or a one-shot reset channel that is only ever touched
/// synchronously). Prefer `tokio::sync::Mutex` for anything held across
/// an await point.
pub struct Mutex<T: ?Sized> {
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    pub fn new(val: T) -> Self {
        Mutex {
            inner: parking_lot::Mutex::new(val),
        }
    }
}

impl<T: ?Sized> Mutex<T> {
    pub fn lock(&self) -> MutexGuard<'_, T> {
        MutexGuard(self.inner.lock())
    }

    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>> {
        self.inner.try_lock().map(MutexGuard).ok_or(Error::ErrDoubleLock)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

pub struct MutexGuard<'a, T: ?Sized>(parking_lot::MutexGuard<'a, T>);

impl<'a, T: ?Sized> Deref for MutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<'a, T: ?Sized> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}
