//! Correlation of outbound requests to later-arriving alias events.
//!
//! Every bind/shutdown/connect request registers interest in a string key
//! before it is sent; the dispatch loop feeds inbound alias events into
//! [`Resolver::notify`]. An explicit table maps each key to a typed entry
//! with an expected success count, so exactly one resolution (success or
//! rejection) reaches each subscriber and orphaned entries stay visible.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

/// Correlation key for a bind/shutdown request on `(id, alias)`.
pub fn alias_key(id: &str, alias: &str) -> String {
    format!("alias id={id} alias={alias}")
}

/// Correlation key for a connect handshake on its connection token.
pub fn connection_key(client_connection_id: &str) -> String {
    format!("connection id={client_connection_id}")
}

/// Which notification value counts as progress for a subscription.
///
/// Bind and connect complete on `set = true`; shutdown is inverted and
/// completes on `set = false` (the alias was successfully removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// `set = true` advances, `set = false` rejects.
    Set,
    /// `set = false` completes, `set = true` rejects.
    Cleared,
}

/// One pending wait entry. Created just before the outbound send, removed
/// on resolution or rejection.
struct Entry {
    required: u32,
    observed: u32,
    polarity: Polarity,
    tx: oneshot::Sender<Result<(), Rejected>>,
}

/// The subscription's key saw a notification of the rejecting polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;

/// Why a subscription ended without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// A notification of the rejecting polarity arrived.
    Rejected,
    /// The resolver went away while the subscription was pending.
    Abandoned,
}

/// Handle for one registered wait. Completes via [`Subscription::wait`].
pub struct Subscription {
    rx: oneshot::Receiver<Result<(), Rejected>>,
}

impl Subscription {
    /// Wait for the subscription to resolve.
    ///
    /// There is no timeout: a subscription whose key never sees a matching
    /// notification waits forever.
    pub async fn wait(self) -> Result<(), WaitError> {
        match self.rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(Rejected)) => Err(WaitError::Rejected),
            Err(_) => Err(WaitError::Abandoned),
        }
    }
}

/// Keyed wait table: key -> pending entry.
///
/// Mutated from the initiators (subscribe) and the dispatch loop (notify);
/// the mutex is the single-writer discipline that keeps both serialized.
#[derive(Default)]
pub struct Resolver {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `key`.
    ///
    /// The subscription completes successfully once `required` notifications
    /// of the completing polarity have been observed, or fails on the first
    /// notification of the rejecting polarity, whichever happens first.
    ///
    /// A new subscription for a key that is already registered replaces the
    /// old entry and abandons its waiter. Entries survive a reconnect
    /// untouched, so the re-issued request after the server comes back hits
    /// the same `(id, alias)` key as its orphaned predecessor.
    pub fn subscribe(&self, key: String, required: u32, polarity: Polarity) -> Subscription {
        let (tx, rx) = oneshot::channel();
        let prev = self.entries.lock().insert(
            key.clone(),
            Entry {
                required,
                observed: 0,
                polarity,
                tx,
            },
        );
        if prev.is_some() {
            // Dropping the previous sender resolves its waiter as abandoned.
            warn!(%key, "replacing stale subscription");
        }
        Subscription { rx }
    }

    /// Feed one notification into the table.
    ///
    /// If no entry is waiting on `key` the notification is dropped; there is
    /// no buffering.
    pub fn notify(&self, key: &str, set: bool) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        let advances = match entry.polarity {
            Polarity::Set => set,
            Polarity::Cleared => !set,
        };

        if advances {
            entry.observed += 1;
            if entry.observed >= entry.required {
                let entry = entries.remove(key).expect("entry present");
                let _ = entry.tx.send(Ok(()));
            }
        } else {
            let entry = entries.remove(key).expect("entry present");
            let _ = entry.tx.send(Err(Rejected));
        }
    }

    /// Number of pending entries. Used by tests to observe orphans.
    pub fn pending(&self) -> usize {
        self.entries.lock().len()
    }
}
