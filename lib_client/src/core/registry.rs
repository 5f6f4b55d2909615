//! # Subscriber Registry
//!
//! Typed pub/sub fan-out for canonical events. Any number of call sites
//! register callbacks per event kind; dispatch invokes them synchronously in
//! registration order. A callback that panics is logged and skipped without
//! aborting its siblings, so one misbehaving scene component can never take
//! down the rest of the visualization.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::router::{CanonicalEvent, EventKind};

/// Token identifying one registration; returned by [`SubscriberRegistry::on`]
/// and consumed by [`SubscriberRegistry::off`].
pub type SubscriptionId = u64;

type Callback = Arc<dyn Fn(CanonicalEvent) + Send + Sync>;

struct Listener {
    id: SubscriptionId,
    callback: Callback,
}

/// Insertion-ordered listener lists keyed by event kind.
///
/// Duplicate registrations of the same callback are permitted and are
/// removable independently through their tokens (array semantics, not set
/// semantics).
pub struct SubscriberRegistry {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends `callback` to the ordered list for `kind`, creating the list
    /// if absent. No dedup is performed.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(CanonicalEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.lock().expect("Registry lock poisoned");
        listeners.entry(kind).or_default().push(Listener {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Removes the registration identified by `id` from the list for `kind`.
    /// No-op if it is not found. Returns whether a listener was removed.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().expect("Registry lock poisoned");
        if let Some(list) = listeners.get_mut(&kind) {
            if let Some(index) = list.iter().position(|l| l.id == id) {
                list.remove(index);
                return true;
            }
        }
        false
    }

    /// Invokes every callback currently registered for the event's kind, in
    /// registration order.
    ///
    /// The listener list is snapshotted before the first invocation, so a
    /// callback that registers or removes subscriptions mid-dispatch does not
    /// affect the current pass. A panicking callback is logged and skipped;
    /// the remaining callbacks still run.
    pub fn dispatch(&self, event: CanonicalEvent) {
        let kind = event.kind;
        let snapshot: Vec<Callback> = {
            let listeners = self.listeners.lock().expect("Registry lock poisoned");
            match listeners.get(&kind) {
                Some(list) => list.iter().map(|l| Arc::clone(&l.callback)).collect(),
                None => return,
            }
        };

        for callback in snapshot {
            let delivery = event.clone();
            if catch_unwind(AssertUnwindSafe(|| callback(delivery))).is_err() {
                log::error!("Subscriber callback for {:?} panicked", kind);
            }
        }
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        let listeners = self.listeners.lock().expect("Registry lock poisoned");
        listeners.get(&kind).map_or(0, Vec::len)
    }
}
