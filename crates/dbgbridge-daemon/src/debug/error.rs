//! Debug session error types.

use tonic::Status;

/// Which side of the bridge reported a terminal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The client's gRPC stream.
    Stream,
    /// The debugger process.
    Process,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => f.write_str("stream"),
            Self::Process => f.write_str("process"),
        }
    }
}

/// Errors that end a debug session. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum DebugError {
    #[error("Handshake failed: {}", .0.message())]
    HandshakeIo(Status),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Failed to start debugger: {reason}")]
    ProcessSpawnFailed { reason: String },

    #[error("Stream read failed: {}", .0.message())]
    StreamReadFailed(Status),

    #[error("Stream write failed: {0}")]
    StreamWriteFailed(String),

    #[error("Debugger output read failed: {0}")]
    ProcessReadFailed(#[source] std::io::Error),

    #[error("Debugger input write failed: {0}")]
    ProcessWriteFailed(#[source] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DebugError {
    /// Side of the bridge this error belongs to, if it arose after launch.
    pub const fn origin(&self) -> Option<Origin> {
        match self {
            Self::StreamReadFailed(_) | Self::StreamWriteFailed(_) => Some(Origin::Stream),
            Self::ProcessReadFailed(_) | Self::ProcessWriteFailed(_) => Some(Origin::Process),
            _ => None,
        }
    }
}

impl From<DebugError> for Status {
    fn from(err: DebugError) -> Self {
        let message = err.to_string();
        match err {
            DebugError::HandshakeIo(status) | DebugError::StreamReadFailed(status) => status,
            DebugError::ProtocolViolation(msg) => Self::invalid_argument(msg),
            DebugError::ProcessSpawnFailed { .. } => Self::failed_precondition(message),
            DebugError::StreamWriteFailed(_) => Self::unavailable(message),
            DebugError::ProcessReadFailed(_) | DebugError::ProcessWriteFailed(_) => {
                Self::aborted(message)
            }
            DebugError::Internal(_) => Self::internal(message),
        }
    }
}
