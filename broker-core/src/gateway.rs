//! The Operator Gateway: the human-facing half of the
//! system. Wraps the Work Queue and In-Flight Registry behind the three
//! operations an operator's poll loop needs: take, submit, defer.

use crate::error::{GatewayError, ValidationError};
use crate::queue::WorkQueue;
use crate::registry::InFlightRegistry;
use crate::types::{QueueStatus, Request, Response};
use crate::validate::validate_request;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant as TokioInstant;
use tracing::debug;

/// An item handed to an operator: enough to render the request, plus the
/// id needed to submit or defer it.
pub struct TakeResult {
    pub id: String,
    pub request: Request,
}

/// The operator-facing half of the broker.
pub struct OperatorGateway {
    queue: Arc<WorkQueue>,
    registry: Arc<InFlightRegistry>,
}

impl OperatorGateway {
    pub fn new(queue: Arc<WorkQueue>, registry: Arc<InFlightRegistry>) -> Self {
        Self { queue, registry }
    }

    /// Long-poll for the next active item, moving it into the in-flight
    /// registry once found. Returns `Err(GatewayError::Timeout)` if
    /// `poll_window` elapses with nothing to hand out.
    ///
    /// Re-validates the request before handing it out: admission already
    /// validated it, but this catches corruption between enqueue and take,
    /// and lets validation rules evolve independently of admission. A
    /// failure here discards the item outright — its `reply_sink` simply
    /// drops, which the caller observes as the Broker's own internal-error
    /// path rather than a second, parallel discard mechanism.
    pub async fn take_next(&self, poll_window: Duration) -> Result<TakeResult, GatewayError> {
        let deadline = TokioInstant::now() + poll_window;
        let item = self
            .queue
            .take_next(deadline)
            .await
            .ok_or(GatewayError::Timeout)?;

        if let Err(e) = validate_request(&item.request) {
            debug!(id = %item.id, error = %e, "discarding item that failed take-time revalidation");
            drop(item);
            return Err(GatewayError::Invalid(e));
        }

        let result = TakeResult {
            id: item.id.clone(),
            request: item.request.clone(),
        };
        debug!(id = %result.id, "operator took item");
        self.registry.put(item);
        Ok(result)
    }

    /// Submit the operator's answer for `id`. Re-validates the original
    /// request before delivering the response: a malformed submission (bad
    /// id, response out of range of the original option list) is discarded
    /// rather than panicking the poll loop: the item is discarded so the
    /// caller keeps waiting for a subsequent correct submit or its own
    /// deadline, rather than complicating in-flight accounting.
    pub fn submit(&self, id: &str, response: Response) -> Result<(), GatewayError> {
        let item = self
            .registry
            .take(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;

        if let Err(e) = revalidate_response(&item.request, &response) {
            // Discard rather than re-register: retaining a partially
            // consumed item complicates in-flight accounting with no
            // observed benefit. The caller will see this attempt time out
            // or can be retried by a subsequent, well-formed submit for a
            // fresh item.
            drop(item);
            return Err(GatewayError::Invalid(e));
        }

        let _ = item.reply_sink.send(response);
        Ok(())
    }

    /// Mark `id` deferred: it returns to the pool of takeable items for
    /// other operators but keeps its place for this one if requeued later.
    pub fn defer(&self, id: &str) -> Result<(), GatewayError> {
        if self.queue.defer(id) {
            return Ok(());
        }
        // The item may have already been taken by this same gateway call
        // and now lives in the registry rather than the queue — deferring
        // an in-flight item means putting it back at the tail of the
        // queue for someone else to take.
        if let Some(item) = self.registry.take(id) {
            self.queue.enqueue(crate::types::QueueItem {
                deferred: true,
                ..item
            });
            return Ok(());
        }
        Err(GatewayError::NotFound(id.to_string()))
    }

    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }
}

fn revalidate_response(request: &Request, response: &Response) -> Result<(), ValidationError> {
    validate_request(request)?;
    let crate::types::OutputSchema::OptionList { options } = request
        .output
        .as_ref()
        .ok_or_else(|| ValidationError::new("output schema unset"))?;
    if response.index < 0 || response.index as usize >= options.len() {
        return Err(ValidationError::new(format!(
            "response index {} out of range for {} option(s)",
            response.index,
            options.len()
        )));
    }
    Ok(())
}
