//! Wakeup channel for re-render triggers.
//!
//! The renderer blocks while nothing changes. Every committed `FieldStore::set`
//! sends the changed key so the renderer can redraw just the affected fields.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::value::FieldKey;

type Pending = Arc<Mutex<BTreeSet<FieldKey>>>;

/// Sender half of the wakeup channel.
///
/// Changed keys collect in a set shared with the receiver; the channel only
/// carries the signal, so an undrained receiver holds at most one entry per
/// field.
#[derive(Clone, Debug)]
pub struct WakeupSender {
    tx: mpsc::Sender<()>,
    pending: Pending,
}

impl WakeupSender {
    /// Record a changed field and signal the receiver.
    ///
    /// Non-blocking. Errors are ignored (full = a signal is already queued,
    /// closed = renderer gone).
    pub fn send(&self, key: &FieldKey) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(key.clone());
        }
        let _ = self.tx.try_send(());
    }
}

/// Receiver half of the wakeup channel.
#[derive(Debug)]
pub struct WakeupReceiver {
    rx: mpsc::Receiver<()>,
    pending: Pending,
}

impl WakeupReceiver {
    /// Wait for a wakeup, then take every field changed since the last one.
    ///
    /// Returns `None` once every sender is gone and nothing is pending.
    pub async fn recv(&mut self) -> Option<BTreeSet<FieldKey>> {
        loop {
            self.rx.recv().await?;
            let keys = self.drain();
            if !keys.is_empty() {
                return Some(keys);
            }
        }
    }

    /// Take every changed field without waiting.
    pub fn drain(&mut self) -> BTreeSet<FieldKey> {
        while self.rx.try_recv().is_ok() {}
        self.pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default()
    }
}

/// Create a new wakeup channel pair.
pub fn channel() -> (WakeupSender, WakeupReceiver) {
    let (tx, rx) = mpsc::channel(16);
    let pending = Pending::default();
    (
        WakeupSender {
            tx,
            pending: Arc::clone(&pending),
        },
        WakeupReceiver { rx, pending },
    )
}

/// Slot for a wakeup sender installed after construction.
#[derive(Debug, Default, Clone)]
pub(crate) struct WakeupHandle {
    inner: Arc<Mutex<Option<WakeupSender>>>,
}

impl WakeupHandle {
    pub(crate) fn install(&self, sender: WakeupSender) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(sender);
        }
    }

    pub(crate) fn send(&self, key: &FieldKey) {
        if let Ok(guard) = self.inner.lock()
            && let Some(sender) = guard.as_ref()
        {
            sender.send(key);
        }
    }
}
