//! Per-entity in-flight tracking.
//!
//! Each entity key maps to the operation currently running against it. A
//! second operation on a busy key is refused instead of racing the first.
//! The map lives in a `watch` channel, so front ends can render busy
//! indicators from the same source the commands consult.

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::watch;

/// Operation holding an entity busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Adding a product to the cart
    Add,
    /// Changing a line quantity
    SetQuantity,
    /// Removing a line
    Remove,
    /// Emptying the cart
    Clear,
    /// Changing an order item's status
    UpdateStatus,
    /// Cancelling an order
    Cancel,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::SetQuantity => "set quantity",
            Self::Remove => "remove",
            Self::Clear => "clear",
            Self::UpdateStatus => "update status",
            Self::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Registry of busy entities keyed by `K`.
#[derive(Debug)]
pub struct InFlight<K> {
    entries: watch::Sender<BTreeMap<K, Operation>>,
}

impl<K> Default for InFlight<K> {
    fn default() -> Self {
        Self {
            entries: watch::Sender::new(BTreeMap::new()),
        }
    }
}

impl<K: Ord + Copy> InFlight<K> {
    /// Mark `key` busy with `operation`.
    ///
    /// Returns `None` if the key is already busy. The key stays busy until
    /// the returned guard is dropped.
    pub fn try_begin(&self, key: K, operation: Operation) -> Option<InFlightGuard<'_, K>> {
        let inserted = self.entries.send_if_modified(|entries| {
            if entries.contains_key(&key) {
                false
            } else {
                entries.insert(key, operation);
                true
            }
        });
        inserted.then_some(InFlightGuard {
            registry: self,
            key,
        })
    }

    /// Operation running against `key`, if any.
    pub fn operation(&self, key: &K) -> Option<Operation> {
        self.entries.borrow().get(key).copied()
    }

    /// Whether `key` is busy.
    pub fn is_busy(&self, key: &K) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Current busy entries.
    pub fn snapshot(&self) -> BTreeMap<K, Operation> {
        self.entries.borrow().clone()
    }

    /// Watch the busy entries change.
    pub fn subscribe(&self) -> watch::Receiver<BTreeMap<K, Operation>> {
        self.entries.subscribe()
    }

    fn finish(&self, key: &K) {
        self.entries.send_if_modified(|entries| entries.remove(key).is_some());
    }
}

/// Keeps an entity busy while alive.
#[must_use = "the entity is released as soon as the guard is dropped"]
pub struct InFlightGuard<'a, K: Ord + Copy> {
    registry: &'a InFlight<K>,
    key: K,
}

impl<K: Ord + Copy> Drop for InFlightGuard<'_, K> {
    fn drop(&mut self) {
        self.registry.finish(&self.key);
    }
}
