//! A transport-agnostic per-call cancellation signal.
//!
//! The Broker only needs to know *that* a caller went away or ran out of
//! time, not *how* the transport observed it. A gRPC (or any other) server
//! builds one of these per call and hands the [`CancelSignal`] half to
//! [`crate::broker::Broker::collect`]; it keeps the [`CancelHandle`] half to
//! fire on client disconnect.

use std::time::Duration;
use tokio::sync::oneshot;

/// Why a [`CancelSignal`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

/// The producer half: fire this when the caller explicitly cancels or
/// disconnects.
pub struct CancelHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl CancelHandle {
    pub fn cancel(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// The consumer half: awaited by [`crate::broker::Broker::collect`].
pub struct CancelSignal {
    rx: oneshot::Receiver<()>,
    deadline: Option<Duration>,
}

impl CancelSignal {
    /// `deadline`, if set, fires `DeadlineExceeded` after that much time has
    /// elapsed even if nobody calls [`CancelHandle::cancel`].
    pub fn new(deadline: Option<Duration>) -> (CancelHandle, Self) {
        let (tx, rx) = oneshot::channel();
        (CancelHandle { tx: Some(tx) }, Self { rx, deadline })
    }

    /// A signal that can only resolve via explicit cancellation, never a
    /// deadline. Useful for tests and for callers with no deadline.
    pub fn without_deadline() -> (CancelHandle, Self) {
        Self::new(None)
    }

    /// Resolves once cancelled or, if a deadline was configured, once it
    /// elapses. Consumes `self`: a cancel signal is observed exactly once,
    /// at the Broker's sole suspension point.
    pub async fn wait(self) -> CancelReason {
        match self.deadline {
            Some(d) => {
                tokio::select! {
                    _ = self.rx => CancelReason::Cancelled,
                    _ = tokio::time::sleep(d) => CancelReason::DeadlineExceeded,
                }
            }
            None => {
                // No deadline configured — only an explicit cancel resolves this.
                // If the sender is dropped without firing, treat it as a cancel
                // rather than hanging forever.
                let _ = self.rx.await;
                CancelReason::Cancelled
            }
        }
    }
}
