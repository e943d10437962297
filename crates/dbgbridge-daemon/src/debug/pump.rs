//! Byte pumps between the client stream and the debugger process.
//!
//! Each pump owns one direction and reports exactly one [`TerminalSignal`]
//! when it stops. Pumps never talk to each other; the session controller
//! consumes the signals.

use dbgbridge_proto::v1::streaming_open_request::Content;
use dbgbridge_proto::v1::{StreamingOpenRequest, StreamingOpenResponse};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tonic::Status;
use tracing::{debug, trace, warn};

use super::error::{DebugError, Origin};

/// Client-to-daemon half of a debug stream.
pub trait InboundStream:
    Stream<Item = Result<StreamingOpenRequest, Status>> + Send + Unpin + 'static
{
}

impl<T> InboundStream for T where
    T: Stream<Item = Result<StreamingOpenRequest, Status>> + Send + Unpin + 'static
{
}

/// Daemon-to-client half of a debug stream.
pub type OutboundSender = mpsc::Sender<Result<StreamingOpenResponse, Status>>;

/// One-time report that a pump has stopped, and why.
#[derive(Debug)]
pub struct TerminalSignal {
    pub origin: Origin,
    /// `None` when the source closed cleanly.
    pub error: Option<DebugError>,
}

impl TerminalSignal {
    pub const fn closed(origin: Origin) -> Self {
        Self {
            origin,
            error: None,
        }
    }

    pub const fn failed(origin: Origin, error: DebugError) -> Self {
        Self {
            origin,
            error: Some(error),
        }
    }
}

/// Forward data frames from the client stream to the debugger's stdin.
///
/// Stops on stream closure, stream error, or the first failed write; a
/// failed or short write is never retried.
pub async fn input_pump<S, W>(mut inbound: S, mut stdin: W, signals: mpsc::Sender<TerminalSignal>)
where
    S: InboundStream,
    W: AsyncWrite + Unpin,
{
    let signal = loop {
        let request = match inbound.next().await {
            Some(Ok(request)) => request,
            Some(Err(status)) => {
                break TerminalSignal::failed(Origin::Stream, DebugError::StreamReadFailed(status));
            }
            None => break TerminalSignal::closed(Origin::Stream),
        };

        match request.content {
            Some(Content::Data(data)) if !data.is_empty() => {
                if let Err(e) = write_frame(&mut stdin, &data).await {
                    break TerminalSignal::failed(Origin::Process, DebugError::ProcessWriteFailed(e));
                }
                trace!(bytes = data.len(), "Forwarded to debugger stdin");
            }
            Some(Content::Data(_)) => {}
            Some(Content::DebugRequest(_)) => {
                warn!("Ignoring configuration message received after handshake");
            }
            None => warn!("Ignoring request without content"),
        }
    };

    debug!(origin = %signal.origin, error = ?signal.error, "Input pump stopped");
    // The controller may already be gone; the signal is then advisory.
    let _ = signals.send(signal).await;
}

async fn write_frame<W: AsyncWrite + Unpin>(stdin: &mut W, data: &[u8]) -> std::io::Result<()> {
    stdin.write_all(data).await?;
    stdin.flush().await
}

/// Forward debugger stdout to the client stream in chunks of at most
/// `buffer_size` bytes.
pub async fn output_pump<R>(
    mut stdout: R,
    outbound: OutboundSender,
    buffer_size: usize,
    signals: mpsc::Sender<TerminalSignal>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size.max(1)];

    let signal = loop {
        let n = match stdout.read(&mut buf).await {
            Ok(0) => break TerminalSignal::closed(Origin::Process),
            Ok(n) => n,
            Err(e) => {
                break TerminalSignal::failed(Origin::Process, DebugError::ProcessReadFailed(e));
            }
        };

        let frame = StreamingOpenResponse {
            data: buf[..n].to_vec(),
        };
        if outbound.send(Ok(frame)).await.is_err() {
            break TerminalSignal::failed(
                Origin::Stream,
                DebugError::StreamWriteFailed("client stream closed".into()),
            );
        }
        trace!(bytes = n, "Forwarded debugger stdout");
    };

    debug!(origin = %signal.origin, error = ?signal.error, "Output pump stopped");
    let _ = signals.send(signal).await;
}
