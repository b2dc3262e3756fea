//! Transport crate: gRPC and HTTP front ends over `broker_core`.

pub mod grpc;
pub mod http;
pub mod state;
