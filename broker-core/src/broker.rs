//! The Broker: the caller-facing half of the system. One
//! [`Broker::collect`] call spans a caller's entire wait, from admission
//! through either a delivered [`Response`] or cancellation.

use crate::cancel::{CancelReason, CancelSignal};
use crate::error::BrokerError;
use crate::queue::WorkQueue;
use crate::registry::InFlightRegistry;
use crate::types::{QueueItem, Request, Response};
use crate::validate::validate_request;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// Removes an item's id from the queue and registry on drop, unless
/// disarmed first.
///
/// `collect()` has three exit paths: the reply arrives (the operator's
/// `submit` already removed the item from the registry, nothing left to
/// clean up — disarm), cancellation resolves first (the item may still be
/// queued or in-flight — clean up both, either is a no-op if the item
/// isn't there), or the enclosing future is dropped from outside (a
/// `tower` timeout, task abort, connection reset) before either branch of
/// the `select!` resolves — the guard's `Drop` impl is the only code path
/// that still runs, so it must not need an `.await` to do its job. That's
/// why the queue and registry use synchronous locks: a guard with async
/// cleanup can't run in `Drop` at all.
struct CleanupGuard {
    queue: Arc<WorkQueue>,
    registry: Arc<InFlightRegistry>,
    id: String,
    armed: bool,
}

impl CleanupGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.queue.remove(&self.id).is_some() {
            debug!(id = %self.id, "cleaned up queued item on collect() exit");
        } else if self.registry.take(&self.id).is_some() {
            debug!(id = %self.id, "cleaned up in-flight item on collect() exit");
        }
    }
}

/// The caller-facing broker: accepts requests, enforces admission
/// control, and suspends the caller until a human answers or the call is
/// cancelled.
pub struct Broker {
    queue: Arc<WorkQueue>,
    registry: Arc<InFlightRegistry>,
}

impl Broker {
    pub fn new(queue: Arc<WorkQueue>, registry: Arc<InFlightRegistry>) -> Self {
        Self { queue, registry }
    }

    /// Validate, admit, enqueue, and block until answered or cancelled.
    ///
    /// `cancel` is the call's sole suspension point: once
    /// enqueued, this function does nothing but wait on the reply channel
    /// racing the cancel signal. It never polls, never re-locks either
    /// structure outside of enqueue/cleanup, and never holds a lock across
    /// an `.await`.
    pub async fn collect(
        &self,
        request: Request,
        cancel: CancelSignal,
    ) -> Result<Response, BrokerError> {
        validate_request(&request)?;

        if self.queue.is_full() {
            warn!("rejecting request: queue at capacity");
            return Err(BrokerError::Overloaded);
        }

        let id = Uuid::now_v7().to_string();
        let (reply_tx, reply_rx) = oneshot::channel::<Response>();
        let item = QueueItem::new(id.clone(), request, reply_tx);
        self.queue.enqueue(item);
        debug!(id = %id, "enqueued request");

        let mut guard = CleanupGuard {
            queue: self.queue.clone(),
            registry: self.registry.clone(),
            id: id.clone(),
            armed: true,
        };

        tokio::select! {
            biased;

            reply = reply_rx => {
                guard.disarm();
                reply.map_err(|_| {
                    BrokerError::Internal("reply sender dropped without a response".into())
                })
            }
            reason = cancel.wait() => {
                debug!(id = %id, ?reason, "collect cancelled");
                match reason {
                    CancelReason::Cancelled => Err(BrokerError::Cancelled),
                    CancelReason::DeadlineExceeded => Err(BrokerError::DeadlineExceeded),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataBlock, Input, OutputOption, OutputSchema, Visualization};
    use std::time::Duration;

    fn valid_request() -> Request {
        Request {
            inputs: vec![Input {
                visualization: Some(Visualization::Grid { rows: 1, cols: 1 }),
                data: Some(DataBlock::Ints { values: vec![1] }),
            }],
            output: Some(OutputSchema::OptionList {
                options: vec![
                    OutputOption {
                        label: "yes".into(),
                        hotkey: "y".into(),
                    },
                    OutputOption {
                        label: "no".into(),
                        hotkey: "n".into(),
                    },
                ],
            }),
        }
    }

    fn broker() -> (Broker, Arc<WorkQueue>, Arc<InFlightRegistry>) {
        let queue = Arc::new(WorkQueue::new(10));
        let registry = Arc::new(InFlightRegistry::new());
        let broker = Broker::new(queue.clone(), registry.clone());
        (broker, queue, registry)
    }

    #[tokio::test]
    async fn invalid_request_rejected_before_enqueue() {
        let (broker, queue, _registry) = broker();
        let (_handle, cancel) = CancelSignal::without_deadline();
        let bad = Request {
            inputs: vec![],
            output: None,
        };
        let err = broker.collect(bad, cancel).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn full_queue_rejects_with_overloaded() {
        let queue = Arc::new(WorkQueue::new(0));
        let registry = Arc::new(InFlightRegistry::new());
        let broker = Broker::new(queue, registry);
        let (_handle, cancel) = CancelSignal::without_deadline();
        let err = broker.collect(valid_request(), cancel).await.unwrap_err();
        assert!(matches!(err, BrokerError::Overloaded));
    }

    #[tokio::test]
    async fn happy_path_operator_answers() {
        let (broker, queue, registry) = broker();
        let (_handle, cancel) = CancelSignal::without_deadline();

        let collect_fut = broker.collect(valid_request(), cancel);
        tokio::pin!(collect_fut);

        // Poll once so the request is enqueued, then answer it directly
        // against the queue/registry the way an operator gateway would.
        tokio::time::sleep(Duration::from_millis(1)).await;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(50);
        let item = queue.take_next(deadline).await.expect("item enqueued");
        let id = item.id.clone();
        registry.put(item);

        let taken = registry.take(&id).unwrap();
        let _ = taken.reply_sink.send(Response { index: 0 });

        let response = collect_fut.await.unwrap();
        assert_eq!(response.index, 0);
    }

    #[tokio::test]
    async fn explicit_cancel_cleans_up_queued_item() {
        let (broker, queue, _registry) = broker();
        let (handle, cancel) = CancelSignal::without_deadline();

        let collect_fut = broker.collect(valid_request(), cancel);
        tokio::pin!(collect_fut);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(queue.len(), 1);
        handle.cancel();

        let err = collect_fut.await.unwrap_err();
        assert!(matches!(err, BrokerError::Cancelled));
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn deadline_exceeded_surfaces_as_deadline_error() {
        let (broker, _queue, _registry) = broker();
        let (_handle, cancel) = CancelSignal::new(Some(Duration::from_millis(10)));
        let err = broker.collect(valid_request(), cancel).await.unwrap_err();
        assert!(matches!(err, BrokerError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn dropping_collect_future_cleans_up_queued_item() {
        let (broker, queue, _registry) = broker();
        let (_handle, cancel) = CancelSignal::without_deadline();

        {
            let collect_fut = broker.collect(valid_request(), cancel);
            tokio::pin!(collect_fut);
            // Poll once to drive enqueue, then drop the future outright —
            // simulating an external timeout/task-abort rather than a
            // cooperative cancel signal.
            let _ = futures_poll_once(&mut collect_fut).await;
        }
        assert_eq!(queue.len(), 0, "CleanupGuard must run on future drop");
    }

    /// Poll a future exactly once without requiring it to complete, so the
    /// test can then drop it mid-flight to exercise `CleanupGuard::drop`.
    async fn futures_poll_once<F: std::future::Future>(fut: &mut std::pin::Pin<&mut F>) {
        use std::task::Poll;
        std::future::poll_fn(|cx| {
            let _ = fut.as_mut().poll(cx);
            Poll::Ready(())
        })
        .await
    }
}
