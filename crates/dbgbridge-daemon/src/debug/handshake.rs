//! First-message validation.
//!
//! A session only exists once the client has sent its configuration; data
//! frames arriving first are rejected before any process is started.

use dbgbridge_proto::v1::streaming_open_request::Content;
use tokio_stream::StreamExt;
use tonic::Status;
use tracing::debug;

use super::config::DebugConfig;
use super::error::DebugError;
use super::pump::InboundStream;

/// Receive exactly one message and interpret it as the session configuration.
pub async fn handshake<S: InboundStream>(inbound: &mut S) -> Result<DebugConfig, DebugError> {
    let first = match inbound.next().await {
        Some(Ok(request)) => request,
        Some(Err(status)) => return Err(DebugError::HandshakeIo(status)),
        None => {
            return Err(DebugError::HandshakeIo(Status::cancelled(
                "stream closed before the configuration message",
            )));
        }
    };

    let Some(Content::DebugRequest(request)) = first.content else {
        return Err(DebugError::ProtocolViolation(
            "first message must be configuration, not data".into(),
        ));
    };

    let config = DebugConfig::from(request);
    if config.is_empty() {
        return Err(DebugError::ProtocolViolation(
            "debug configuration is empty".into(),
        ));
    }

    debug!(fqbn = %config.fqbn, sketch = %config.sketch_path.display(), "Handshake accepted");
    Ok(config)
}
