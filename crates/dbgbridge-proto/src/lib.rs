//! dbgbridge Protocol Buffers
//!
//! Generated protobuf code for the dbgbridge gRPC API.
//!
//! This crate contains:
//! - `DebugService` for bridging a client stream to a debugger process

#![allow(clippy::derive_partial_eq_without_eq)]

pub mod methods;

/// dbgbridge v1 API definitions.
///
/// All generated types and services are included here.
pub mod v1 {
    tonic::include_proto!("dbgbridge.v1");
}

// Re-export v1 as the default API version for convenience
pub use v1::*;
