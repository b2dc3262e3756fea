//! Error taxonomy for the broker core.
//!
//! Transport crates (gRPC, HTTP) map these onto their own status codes via
//! [`BrokerError::kind`] / [`GatewayError::kind`] rather than matching on
//! variants directly, so a new variant only needs one mapping updated.

use thiserror::Error;

/// A single validation failure, carrying a path-qualified message
/// (`"input 2: grid too large (...)"`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Transport-agnostic classification of a [`BrokerError`], matching the
/// RPC error codes used by the transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    ResourceExhausted,
    Cancelled,
    DeadlineExceeded,
    NotFound,
    Internal,
}

/// Errors returned from [`crate::broker::Broker::collect`].
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("overloaded: queue already holds the configured maximum")]
    Overloaded,
    #[error("cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("internal: {0}")]
    Internal(String),
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::Validation(_) => ErrorKind::InvalidArgument,
            BrokerError::Overloaded => ErrorKind::ResourceExhausted,
            BrokerError::Cancelled => ErrorKind::Cancelled,
            BrokerError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            BrokerError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Errors returned from [`crate::gateway::OperatorGateway`] operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no pending item arrived within the poll window")]
    Timeout,
    #[error("no item with id {0}")]
    NotFound(String),
    #[error("malformed response body: {0}")]
    Malformed(String),
    #[error("revalidation at take-time failed: {0}")]
    Invalid(#[from] ValidationError),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Timeout => ErrorKind::DeadlineExceeded,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Malformed(_) => ErrorKind::InvalidArgument,
            GatewayError::Invalid(_) => ErrorKind::InvalidArgument,
        }
    }
}
