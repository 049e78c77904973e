//! The "request in flight" signal shown by status displays.

use std::sync::Arc;

use tokio::sync::watch;

/// A boolean signal that is `true` while a backend request is running.
///
/// Cloning shares the same signal, so the validator and the submitter can
/// report into one channel. Observers hold a [`watch::Receiver`] and only
/// ever see the latest value.
#[derive(Debug, Clone)]
pub struct StatusSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StatusSignal {
    /// Creates a signal that starts at `false`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Returns a receiver for status changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Returns the current value.
    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    /// Sets the value. Never fails, even with no receivers.
    pub fn set(&self, busy: bool) {
        self.tx.send_replace(busy);
    }

    /// Raises the signal until the returned guard is dropped.
    pub fn busy(&self) -> BusyGuard {
        self.set(true);
        BusyGuard {
            signal: self.clone(),
        }
    }
}

impl Default for StatusSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowers its [`StatusSignal`] when dropped, whatever path the request took.
#[must_use = "the signal drops back to false as soon as the guard is dropped"]
#[derive(Debug)]
pub struct BusyGuard {
    signal: StatusSignal,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.signal.set(false);
    }
}
