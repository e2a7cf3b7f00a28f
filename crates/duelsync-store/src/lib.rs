//! The shared store: the only coordination channel between the two
//! clients of a match.
//!
//! The store is a replicated tree of JSON values with point writes,
//! push-generated child ids, atomic integer increment, a vacant-slot
//! compare-and-set ([`SharedStore::claim`]), removal, subtree
//! subscriptions, and run-on-disconnect cleanup registration. The only
//! write-conflict policy is last-write-wins, so protocol correctness
//! has to come from convergent full-record writes plus the `claim` and
//! `atomic_increment` primitives.
//!
//! # Key types
//!
//! - [`SharedStore`] — the trait the protocol is generic over
//! - [`MemoryStore`] — in-process reference implementation (tests, demos)
//! - [`Subscription`] — a cancellable stream of subtree snapshots

#![allow(async_fn_in_trait)]

mod error;
mod memory;

use serde_json::Value;
use tokio::sync::mpsc;

pub use error::StoreError;
pub use memory::MemoryStore;

/// A point-in-time view of a subtree: `None` means the path is vacant.
pub type Snapshot = Option<Value>;

/// The shared replicated store interface.
///
/// All operations are asynchronous and may fail independently of each
/// other. No ordering is guaranteed across subscribers beyond
/// "eventually everyone observes the latest value", so callers must
/// re-evaluate their predicates on every notification and tolerate
/// intermediate states.
pub trait SharedStore: Clone + Send + Sync + 'static {
    /// Reads the value at `path`, or `None` if vacant.
    async fn read(&self, path: &str) -> Result<Snapshot, StoreError>;

    /// Writes `value` at `path`, replacing whatever was there.
    /// Last write wins.
    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Appends `value` under `path` with a generated child id and
    /// returns that id. Generated ids sort in creation order.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Atomically adds `delta` to the integer at `path` (vacant counts
    /// as 0) and returns the new value.
    async fn atomic_increment(&self, path: &str, delta: i64) -> Result<i64, StoreError>;

    /// Writes `value` at `path` only if the path is vacant. Returns
    /// `true` if this call performed the write. This is the
    /// compare-and-set primitive used to elect a single writer among
    /// racing clients.
    async fn claim(&self, path: &str, value: Value) -> Result<bool, StoreError>;

    /// Removes the value at `path`. Removing a vacant path is a no-op.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Subscribes to the subtree at `path`. The subscription fires
    /// immediately with the current snapshot, then again on every
    /// change that touches the subtree. Dropping the [`Subscription`]
    /// cancels it.
    fn subscribe(&self, path: &str) -> Subscription;

    /// Registers `path` for removal when this client's connection to
    /// the store drops. Lets an abrupt disconnect clean up transient
    /// records (queue entries) that the client can no longer remove
    /// itself.
    async fn on_disconnect_remove(&self, path: &str) -> Result<(), StoreError>;
}

/// A live subscription to a subtree.
///
/// Wraps a channel of snapshots plus a cancel hook invoked on drop, so
/// tearing down a component (select-loop exit, timeout, leave) is
/// enough to stop acting on stale notifications.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Builds a subscription from its receiving half and a cancel hook.
    /// Store implementations call this; protocol code only consumes.
    pub fn new(
        rx: mpsc::UnboundedReceiver<Snapshot>,
        cancel: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            rx,
            cancel: Some(cancel),
        }
    }

    /// Waits for the next snapshot. Returns `None` once the store side
    /// has gone away. Cancel-safe: losing a `select!` race does not
    /// lose a snapshot.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Returns an already-delivered snapshot without waiting, or `None`
    /// if nothing is pending. Mainly useful in tests.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
