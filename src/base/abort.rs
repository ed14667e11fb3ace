//! Caller-side cancellation.
//!
//! An [`AbortController`] owns the right to fire; any number of
//! [`AbortSignal`] clones observe it. The engine attaches an
//! [`AbortListener`] per attempt and detaches it when the attempt settles.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    senders: HashMap<u64, oneshot::Sender<()>>,
}

#[derive(Default)]
struct SignalInner {
    aborted: AtomicBool,
    listeners: Mutex<Listeners>,
}

impl SignalInner {
    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        // Listener bookkeeping stays consistent even if a holder panicked.
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fires the [`AbortSignal`]s handed out from it.
#[derive(Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal observing this controller.
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Fire the signal. Only the first call has an effect.
    pub fn abort(&self) {
        self.signal.fire();
    }
}

/// Read side of an [`AbortController`].
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Arc<SignalInner>,
}

impl AbortSignal {
    pub fn aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    /// Number of currently attached listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners().senders.len()
    }

    /// Attach a listener that resolves once the signal fires.
    pub fn subscribe(&self) -> AbortListener {
        let (tx, rx) = oneshot::channel();
        let mut listeners = self.inner.listeners();
        let id = listeners.next_id;
        listeners.next_id += 1;

        if self.aborted() {
            let _ = tx.send(());
        } else {
            listeners.senders.insert(id, tx);
        }

        AbortListener {
            signal: self.clone(),
            id,
            rx,
        }
    }

    fn fire(&self) {
        // Held across the flag flip so `subscribe` cannot slip in between.
        let mut listeners = self.inner.listeners();
        if self.inner.aborted.swap(true, Ordering::AcqRel) {
            return;
        }
        for (_, tx) in listeners.senders.drain() {
            let _ = tx.send(());
        }
    }

    fn detach(&self, id: u64) -> bool {
        self.inner.listeners().senders.remove(&id).is_some()
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.aborted())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// A single registration on an [`AbortSignal`].
#[derive(Debug)]
pub struct AbortListener {
    signal: AbortSignal,
    id: u64,
    rx: oneshot::Receiver<()>,
}

impl AbortListener {
    /// Resolves when the signal fires. Never resolves once detached.
    pub async fn fired(&mut self) {
        if (&mut self.rx).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Remove this registration. Returns `false` if it was already gone,
    /// either because the signal fired or because of an earlier detach.
    pub fn detach(&mut self) -> bool {
        self.signal.detach(self.id)
    }
}
