//! Wire-level data model shared by the caller RPC and the operator HTTP API.
//!
//! These types are deliberately plain: no behavior lives here beyond
//! `Serialize`/`Deserialize`. Validation lives in [`crate::validate`];
//! queue membership lives in [`crate::queue`] and [`crate::registry`].

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::oneshot;

/// One input panel shown to the operator, paired with its data block.
///
/// Both fields are `Option` even though a well-formed request always sets
/// them: the wire format allows the variant to be unset, and the validator
/// must reject that explicitly rather than defaulting silently (see
/// design notes below).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Input {
    pub visualization: Option<Visualization>,
    pub data: Option<DataBlock>,
}

/// How a single input is rendered to the operator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Visualization {
    Grid {
        rows: i32,
        cols: i32,
    },
    MultiGrid {
        rows: i32,
        cols: i32,
        channels: i32,
        #[serde(default)]
        channel_names: Vec<String>,
    },
    Scalar {
        label: String,
        min: f64,
        max: f64,
        #[serde(default)]
        unit: String,
    },
    Vector {
        label: String,
        max_magnitude: f64,
    },
    TimeSeries {
        label: String,
        points: i32,
        min_value: f64,
        max_value: f64,
    },
}

/// The raw sample data backing an [`Input`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataBlock {
    Ints { values: Vec<i64> },
    Floats { values: Vec<f64> },
}

/// One labeled, hotkeyed choice in an [`OutputSchema::OptionList`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputOption {
    pub label: String,
    /// Always expected to be exactly one character; enforced by the validator.
    pub hotkey: String,
}

/// The shape of the reply the operator is asked to produce.
///
/// Only one variant exists today, but it stays a tagged enum (rather than a
/// bare struct) so an unset schema is representable and rejectable, and so
/// a future reply shape doesn't require changing every call site.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputSchema {
    OptionList { options: Vec<OutputOption> },
}

/// A collection request submitted by a caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    pub inputs: Vec<Input>,
    pub output: Option<OutputSchema>,
}

/// The operator's response: the chosen option's 0-based index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response {
    pub index: i32,
}

/// The unit of work held by the Work Queue and the In-Flight Registry.
///
/// A `QueueItem` has exactly one logical owner at a time: the queue while
/// waiting, the registry while handed to an operator, or the broker's
/// cleanup path during teardown.
pub struct QueueItem {
    pub id: String,
    pub request: Request,
    /// Single-use, capacity-1 delivery channel back to the suspended caller.
    pub reply_sink: oneshot::Sender<Response>,
    pub enqueued_at: Instant,
    pub deferred: bool,
}

impl QueueItem {
    pub fn new(id: String, request: Request, reply_sink: oneshot::Sender<Response>) -> Self {
        Self {
            id,
            request,
            reply_sink,
            enqueued_at: Instant::now(),
            deferred: false,
        }
    }
}

/// A consistent snapshot of queue occupancy.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStatus {
    pub total: usize,
    pub active: usize,
    pub deferred: usize,
}
