//! Per-resource wake registry.
//!
//! Local waiters on the same resource share one [`Notify`] so that a single
//! release event wakes all of them at once. Entries are reference counted:
//! an entry exists exactly while at least one waiter is registered and is
//! dropped the moment the count reaches zero. A later waiter always gets a
//! fresh entry.
//!
//! Every change replaces the whole entry (`Arc<WaitEntry>`) under the
//! dashmap shard lock of its key, so an increment can never race with the
//! removal of the same entry.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Notify;

/// Immutable snapshot of a resource's waiters.
#[derive(Debug)]
struct WaitEntry {
    waiters: usize,
    signal: Arc<Notify>,
}

/// Thread-safe map from resource to a shared wake signal.
#[derive(Debug, Default)]
pub struct WakeRegistry {
    entries: DashMap<String, Arc<WaitEntry>>,
}

impl WakeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter on `resource` and return its guard.
    ///
    /// The guard unregisters the waiter when dropped, including when the
    /// waiting future is cancelled.
    pub fn acquire_waiter(&self, resource: &str) -> WaiterGuard<'_> {
        let entry = self
            .entries
            .entry(resource.to_string())
            .and_modify(|current| {
                *current = Arc::new(WaitEntry {
                    waiters: current.waiters + 1,
                    signal: Arc::clone(&current.signal),
                });
            })
            .or_insert_with(|| {
                Arc::new(WaitEntry {
                    waiters: 1,
                    signal: Arc::new(Notify::new()),
                })
            });
        let signal = Arc::clone(&entry.signal);
        drop(entry);

        WaiterGuard {
            registry: self,
            resource: resource.to_string(),
            signal,
        }
    }

    /// Unregister one waiter on `resource`, removing the entry at zero.
    pub fn release_waiter(&self, resource: &str) {
        if let Entry::Occupied(mut occupied) = self.entries.entry(resource.to_string()) {
            let current = Arc::clone(occupied.get());
            if current.waiters <= 1 {
                occupied.remove();
            } else {
                occupied.insert(Arc::new(WaitEntry {
                    waiters: current.waiters - 1,
                    signal: Arc::clone(&current.signal),
                }));
            }
        }
    }

    /// Wake every waiter currently registered on `resource`.
    ///
    /// Returns `false` (and does nothing) when nobody is waiting.
    pub fn notify(&self, resource: &str) -> bool {
        match self.entries.get(resource) {
            Some(entry) => {
                entry.signal.notify_waiters();
                true
            }
            None => false,
        }
    }

    /// Number of waiters registered on `resource`.
    pub fn waiter_count(&self, resource: &str) -> usize {
        self.entries
            .get(resource)
            .map(|entry| entry.waiters)
            .unwrap_or(0)
    }

    /// Number of resources with at least one waiter.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is waiting on anything.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registration of one waiter. Unregisters on drop.
#[derive(Debug)]
pub struct WaiterGuard<'a> {
    registry: &'a WakeRegistry,
    resource: String,
    signal: Arc<Notify>,
}

impl WaiterGuard<'_> {
    /// The shared signal to await.
    pub fn signal(&self) -> &Notify {
        &self.signal
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.registry.release_waiter(&self.resource);
    }
}
