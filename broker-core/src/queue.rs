//! The Work Queue: FIFO storage for items awaiting an
//! operator, plus a wake protocol for long-polling takers.
//!
//! All state lives behind a [`std::sync::RwLock`] rather than
//! `tokio::sync::RwLock`. Every operation here is a bounded in-memory
//! mutation with no `.await` inside the critical section, so the
//! synchronous lock never blocks the executor — and, crucially, it can be
//! acquired from a `Drop` impl. [`crate::broker::CleanupGuard`] depends on
//! that: it is the only way to guarantee queue/registry cleanup runs on
//! every exit path, including a caller's future being dropped out from
//! under `collect()` by an external timeout.

use crate::types::{QueueItem, QueueStatus};
use std::collections::VecDeque;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;

/// Capacity of each waiter's wake channel. One slot is enough: a waiter
/// only needs to know "something changed, check again," never how many
/// times or what changed.
const WAKE_CHANNEL_CAPACITY: usize = 1;

struct Inner {
    items: VecDeque<QueueItem>,
    waiters: Vec<mpsc::Sender<()>>,
}

/// FIFO of [`QueueItem`]s waiting for an operator to take them.
pub struct WorkQueue {
    inner: RwLock<Inner>,
    max_inflight: usize,
}

impl WorkQueue {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: VecDeque::new(),
                waiters: Vec::new(),
            }),
            max_inflight,
        }
    }

    /// Current total occupancy (queued + deferred; the in-flight registry
    /// tracks items an operator already took, which no longer count here).
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().items.len()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_inflight
    }

    /// Push a new item to the back of the queue and wake exactly one
    /// waiter, if any are parked. Admission control (`is_full`) is the
    /// caller's responsibility — this never rejects on capacity.
    ///
    /// Panics if `item.id` is already present: ids are generated fresh per
    /// call by the broker, so a collision is a programming error, not a
    /// recoverable condition.
    pub fn enqueue(&self, item: QueueItem) {
        let mut guard = self.inner.write().unwrap();
        assert!(
            !guard.items.iter().any(|existing| existing.id == item.id),
            "duplicate queue item id {}",
            item.id
        );
        guard.items.push_back(item);
        Self::wake_one(&mut guard.waiters);
    }

    fn wake_one(waiters: &mut Vec<mpsc::Sender<()>>) {
        // try_send never blocks; a full or closed waiter is simply dropped
        // from the list, since it's either already been woken or gone.
        while let Some(waiter) = waiters.pop() {
            if waiter.try_send(()).is_ok() {
                return;
            }
        }
    }

    fn wake_all(waiters: &mut Vec<mpsc::Sender<()>>) {
        for waiter in waiters.drain(..) {
            let _ = waiter.try_send(());
        }
    }

    /// Pop the oldest non-deferred item, or park until one arrives or
    /// `deadline` passes. A deferred item only becomes takeable once no
    /// non-deferred item remains ahead of it — at that point it's either
    /// first by position or the only item left, so the front of the deque
    /// is always the right one to return. Never holds the lock across an
    /// `.await`: each loop iteration takes the lock just long enough to
    /// check-and-pop or to register as a waiter, then releases it before
    /// sleeping.
    pub async fn take_next(&self, deadline: TokioInstant) -> Option<QueueItem> {
        loop {
            let mut rx = {
                let mut guard = self.inner.write().unwrap();
                if let Some(pos) = guard.items.iter().position(|i| !i.deferred) {
                    return guard.items.remove(pos);
                }
                if !guard.items.is_empty() {
                    return guard.items.pop_front();
                }
                let (tx, rx) = mpsc::channel(WAKE_CHANNEL_CAPACITY);
                guard.waiters.push(tx);
                rx
            };

            let now = TokioInstant::now();
            if now >= deadline {
                return None;
            }
            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep_until(deadline) => return None,
            }
        }
    }

    /// Mark an item deferred and move it to the tail, so deferred items
    /// are ordered by most-recent defer time and never jump ahead of a
    /// non-deferred item. Returns `false` if no such id is present
    /// (already taken, removed, or cancelled).
    pub fn defer(&self, id: &str) -> bool {
        let mut guard = self.inner.write().unwrap();
        let Some(pos) = guard.items.iter().position(|i| i.id == id) else {
            return false;
        };
        let mut item = guard.items.remove(pos).unwrap();
        item.deferred = true;
        guard.items.push_back(item);
        true
    }

    /// Remove an item regardless of its deferred state, returning it if
    /// present. Used by cancellation cleanup: the caller went away while
    /// still queued, so the item must never reach an operator.
    pub fn remove(&self, id: &str) -> Option<QueueItem> {
        let mut guard = self.inner.write().unwrap();
        let pos = guard.items.iter().position(|i| i.id == id)?;
        guard.items.remove(pos)
    }

    pub fn status(&self) -> QueueStatus {
        let guard = self.inner.read().unwrap();
        let deferred = guard.items.iter().filter(|i| i.deferred).count();
        QueueStatus {
            total: guard.items.len(),
            active: guard.items.len() - deferred,
            deferred,
        }
    }

    /// Wake every parked waiter. Called on shutdown so long-polling takers
    /// observe the deadline promptly instead of riding it out.
    pub fn wake_all_waiters(&self) {
        let mut guard = self.inner.write().unwrap();
        Self::wake_all(&mut guard.waiters);
    }
}
