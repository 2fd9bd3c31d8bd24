//! Observer registry for chain events.
//!
//! Subscriptions are identified by monotonically increasing 64-bit ids.
//! Fan-out is synchronous: `Blockchain::append` does not return until every
//! observer has been invoked. A panicking observer is logged and swallowed;
//! the batch it observed is already committed.

use crate::{BlockAddedEvent, Blockchain};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// Identifier returned by `subscribe`, used to unsubscribe.
pub type SubscriptionId = u64;

/// Receives chain events after each committed append.
pub trait BlockAddedObserver: Send + Sync {
    /// Called once per committed mutation, in append order.
    fn on_block_added(&self, event: &BlockAddedEvent, blockchain: &Blockchain);
}

/// Subscriber set with id-based removal.
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    entries: RwLock<HashMap<SubscriptionId, Arc<dyn BlockAddedObserver>>>,
}

impl Subscribers {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn BlockAddedObserver>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(id, observer);
        id
    }

    /// Returns whether an entry was removed.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.entries.write().remove(&id).is_some()
    }

    pub(crate) fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// The subscriber set is snapshotted up front, so an unsubscribe racing
    /// a notification may still see this one event.
    pub(crate) fn notify(&self, event: &BlockAddedEvent, blockchain: &Blockchain) {
        let snapshot: Vec<(SubscriptionId, Arc<dyn BlockAddedObserver>)> = self
            .entries
            .read()
            .iter()
            .map(|(id, observer)| (*id, Arc::clone(observer)))
            .collect();

        for (id, observer) in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| {
                observer.on_block_added(event, blockchain);
            }));
            if result.is_err() {
                error!(subscription_id = id, "Block-added observer panicked");
            }
        }
    }
}
