//! Core domain logic for the human-in-the-loop collection broker:
//! transport-agnostic types, validation, queueing, and the broker/gateway
//! facades that the gRPC and HTTP crates wrap.
//!
//! Nothing in this crate knows about tonic, axum, or any other transport.
//! [`cancel::CancelSignal`] is the one seam a transport must implement
//! against; everything else is plain async Rust over in-memory state.

pub mod broker;
pub mod cancel;
pub mod config;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod registry;
pub mod types;
pub mod validate;

pub use broker::Broker;
pub use cancel::{CancelHandle, CancelReason, CancelSignal};
pub use config::Config;
pub use error::{BrokerError, ErrorKind, GatewayError, ValidationError};
pub use gateway::{OperatorGateway, TakeResult};
pub use queue::WorkQueue;
pub use registry::InFlightRegistry;
pub use types::{
    DataBlock, Input, OutputOption, OutputSchema, QueueItem, QueueStatus, Request, Response,
    Visualization,
};
