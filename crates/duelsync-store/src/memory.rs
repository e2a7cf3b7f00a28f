//! In-process reference store.
//!
//! `MemoryStore` keeps the whole tree as one `serde_json::Value` behind
//! a mutex and fans change notifications out to prefix-matched
//! subscribers over unbounded channels. It exists for tests and demos:
//! the protocol crates only ever see the [`SharedStore`] trait, so a
//! real replicated backend slots in without touching them.
//!
//! Cloning a `MemoryStore` shares the tree *and* the connection;
//! [`MemoryStore::client`] creates a second connection to the same tree
//! with its own disconnect registrations and fault-injection switch —
//! that is how a test hosts both players of a match.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::{SharedStore, Snapshot, StoreError, Subscription};

struct Subscriber {
    id: u64,
    prefix: Vec<String>,
    tx: mpsc::UnboundedSender<Snapshot>,
}

struct Inner {
    root: Value,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
    next_push_id: u64,
}

/// Shared-tree store living in process memory.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    /// Paths this connection registered for removal on disconnect.
    disconnect_paths: Arc<Mutex<Vec<String>>>,
    /// Fault injection: when set, every operation fails.
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                root: Value::Object(Map::new()),
                subscribers: Vec::new(),
                next_subscriber_id: 0,
                next_push_id: 0,
            })),
            disconnect_paths: Arc::new(Mutex::new(Vec::new())),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens a second connection to the same tree. Disconnect
    /// registrations and the offline switch are per connection.
    pub fn client(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            disconnect_paths: Arc::new(Mutex::new(Vec::new())),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulates losing this connection: runs every registered
    /// on-disconnect removal, then clears the registrations.
    pub fn disconnect(&self) {
        let paths = std::mem::take(
            &mut *self
                .disconnect_paths
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        for path in paths {
            if let Ok(segments) = split_path(&path) {
                tracing::debug!(%path, "disconnect cleanup");
                remove_at(&mut inner.root, &segments);
                notify(&mut inner, &segments);
            }
        }
    }

    /// Fault injection: while `true`, every operation on this
    /// connection returns [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live subscriptions across all connections.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for MemoryStore {
    async fn read(&self, path: &str) -> Result<Snapshot, StoreError> {
        self.check_online()?;
        let segments = split_path(path)?;
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(resolve(&inner.root, &segments).cloned())
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check_online()?;
        let segments = split_path(path)?;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *resolve_or_create(&mut inner.root, &segments) = value;
        notify(&mut inner, &segments);
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        self.check_online()?;
        let mut segments = split_path(path)?;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_push_id += 1;
        // Zero-padded so lexical order equals creation order, like the
        // push ids of replicated tree databases.
        let id = format!("{:010}", inner.next_push_id);
        segments.push(id.clone());
        *resolve_or_create(&mut inner.root, &segments) = value;
        notify(&mut inner, &segments);
        Ok(id)
    }

    async fn atomic_increment(&self, path: &str, delta: i64) -> Result<i64, StoreError> {
        self.check_online()?;
        let segments = split_path(path)?;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = resolve_or_create(&mut inner.root, &segments);
        let current = match slot {
            Value::Null => 0,
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| StoreError::NotAnInteger(path.to_string()))?,
            _ => return Err(StoreError::NotAnInteger(path.to_string())),
        };
        let next = current + delta;
        *slot = Value::from(next);
        notify(&mut inner, &segments);
        Ok(next)
    }

    async fn claim(&self, path: &str, value: Value) -> Result<bool, StoreError> {
        self.check_online()?;
        let segments = split_path(path)?;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if resolve(&inner.root, &segments).is_some() {
            return Ok(false);
        }
        *resolve_or_create(&mut inner.root, &segments) = value;
        notify(&mut inner, &segments);
        Ok(true)
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.check_online()?;
        let segments = split_path(path)?;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if remove_at(&mut inner.root, &segments) {
            notify(&mut inner, &segments);
        }
        Ok(())
    }

    fn subscribe(&self, path: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let prefix = match split_path(path) {
            Ok(p) => p,
            Err(_) => {
                // An invalid path can never match a change; hand back a
                // subscription that only ever yields the vacant snapshot.
                let _ = tx.send(None);
                return Subscription::new(rx, Box::new(|| {}));
            }
        };

        let id;
        {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            id = inner.next_subscriber_id;
            inner.next_subscriber_id += 1;
            // Initial snapshot, so subscribers see pre-existing state
            // without waiting for the next mutation.
            let _ = tx.send(resolve(&inner.root, &prefix).cloned());
            inner.subscribers.push(Subscriber { id, prefix, tx });
        }

        let inner = Arc::clone(&self.inner);
        let cancel = Box::new(move || {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.subscribers.retain(|s| s.id != id);
        });
        Subscription::new(rx, cancel)
    }

    async fn on_disconnect_remove(&self, path: &str) -> Result<(), StoreError> {
        self.check_online()?;
        split_path(path)?;
        self.disconnect_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tree plumbing
// ---------------------------------------------------------------------------

fn split_path(path: &str) -> Result<Vec<String>, StoreError> {
    if path.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let segments: Vec<String> = path.split('/').map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn resolve<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for seg in segments {
        node = node.as_object()?.get(seg)?;
    }
    Some(node)
}

/// Walks to `segments`, materializing intermediate objects. A leaf that
/// is not an object gets replaced by one — last write wins, including
/// over the shape of the tree.
fn resolve_or_create<'a>(root: &'a mut Value, segments: &[String]) -> &'a mut Value {
    let mut node = root;
    for seg in segments {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map.entry(seg.clone()).or_insert(Value::Null),
            // Not reachable, the node was just made an object.
            other => other,
        };
    }
    node
}

/// Removes the value at `segments`. Returns `true` if something was
/// actually removed.
fn remove_at(root: &mut Value, segments: &[String]) -> bool {
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return false,
    };
    let mut node = root;
    for seg in parents {
        node = match node.as_object_mut().and_then(|o| o.get_mut(seg)) {
            Some(n) => n,
            None => return false,
        };
    }
    node.as_object_mut()
        .map(|o| o.remove(last).is_some())
        .unwrap_or(false)
}

/// `true` when a change at `changed` is visible from a subscription
/// rooted at `prefix` (either contains the other).
fn related(prefix: &[String], changed: &[String]) -> bool {
    let n = prefix.len().min(changed.len());
    prefix[..n] == changed[..n]
}

/// Sends the current snapshot at each affected subscriber's prefix.
/// Subscribers whose receiving half is gone are pruned here.
fn notify(inner: &mut Inner, changed: &[String]) {
    let Inner {
        root, subscribers, ..
    } = inner;
    subscribers.retain(|sub| {
        if !related(&sub.prefix, changed) {
            return true;
        }
        sub.tx.send(resolve(root, &sub.prefix).cloned()).is_ok()
    });
}
