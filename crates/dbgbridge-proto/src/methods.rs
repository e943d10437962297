//! Named constants for gRPC method strings.
//!
//! Derived from the protobuf service definitions so that logs and clients
//! refer to methods without duplicating string literals.

// ---------------------------------------------------------------------------
// DebugService
// ---------------------------------------------------------------------------

/// `DebugService/StreamingOpen`
pub const METHOD_STREAMING_OPEN: &str = "DebugService/StreamingOpen";

/// Fully qualified gRPC service name of `DebugService`.
pub const DEBUG_SERVICE_NAME: &str = "dbgbridge.v1.DebugService";
