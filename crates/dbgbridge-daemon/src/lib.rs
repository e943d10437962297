//! dbgbridge Daemon Library
//!
//! Core functionality for the dbgbridge daemon:
//! - Debug sessions bridging a client stream to a debugger's stdin/stdout
//! - Debugger process launching from recipe patterns
//! - gRPC server exposing `DebugService`

pub mod debug;
pub mod server;
