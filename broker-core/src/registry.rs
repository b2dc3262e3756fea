//! The In-Flight Registry: items an operator has taken but
//! not yet submitted a response for.
//!
//! Like [`crate::queue::WorkQueue`], this uses a synchronous
//! [`std::sync::RwLock`] rather than an async one, so it can be drained
//! from [`crate::broker::CleanupGuard`]'s `Drop` impl.

use crate::types::QueueItem;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InFlightRegistry {
    items: RwLock<HashMap<String, QueueItem>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Record an item an operator just took from the queue.
    pub fn put(&self, item: QueueItem) {
        let mut guard = self.items.write().unwrap();
        guard.insert(item.id.clone(), item);
    }

    /// Remove and return the item with `id`, if present. Used both by a
    /// successful submit (the item is consumed and replied to) and by
    /// cancellation cleanup (the item is consumed and discarded).
    pub fn take(&self, id: &str) -> Option<QueueItem> {
        let mut guard = self.items.write().unwrap();
        guard.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.read().unwrap().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap().len()
    }
}

impl Default for InFlightRegistry {
    fn default() -> Self {
        Self::new()
    }
}
