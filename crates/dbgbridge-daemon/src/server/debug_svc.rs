//! `DebugService` gRPC implementation.

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};
use tracing::{Instrument, info, info_span, instrument, warn};

use dbgbridge_proto::methods::METHOD_STREAMING_OPEN;
use dbgbridge_proto::v1::{
    StreamingOpenRequest, StreamingOpenResponse, debug_service_server::DebugService,
};

use crate::debug::{DebugSession, InboundStream, Launcher};

/// Frames buffered towards a slow client before the output pump waits.
const OUTBOUND_BUFFER: usize = 64;

type DebugResponseStream =
    Pin<Box<dyn Stream<Item = Result<StreamingOpenResponse, Status>> + Send + 'static>>;

/// `DebugService` implementation running one [`DebugSession`] per call.
#[derive(Clone)]
pub struct DebugServiceImpl {
    launcher: Arc<dyn Launcher>,
    read_buffer_size: usize,
    sessions: Arc<Semaphore>,
    max_sessions: usize,
}

impl DebugServiceImpl {
    pub fn new(launcher: Arc<dyn Launcher>, read_buffer_size: usize, max_sessions: usize) -> Self {
        let max_sessions = max_sessions.max(1);
        Self {
            launcher,
            read_buffer_size,
            sessions: Arc::new(Semaphore::new(max_sessions)),
            max_sessions,
        }
    }

    /// Sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.max_sessions - self.sessions.available_permits()
    }

    /// Start a session over `inbound` and return the outbound stream.
    ///
    /// The session runs in its own task. A failed session ends the stream
    /// with its error status; a graceful one ends it cleanly.
    pub fn open_session<S: InboundStream>(
        &self,
        inbound: S,
    ) -> Result<ReceiverStream<Result<StreamingOpenResponse, Status>>, Status> {
        let permit = Arc::clone(&self.sessions)
            .try_acquire_owned()
            .map_err(|_| {
                Status::resource_exhausted(format!(
                    "Debug session limit reached ({})",
                    self.max_sessions
                ))
            })?;

        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let session = DebugSession::new(Arc::clone(&self.launcher), self.read_buffer_size);
        let span = info_span!("debug_session", session_id = %session.id());

        tokio::spawn(
            async move {
                let _permit = permit;
                match session.run(inbound, tx.clone()).await {
                    Ok(closure) => info!(?closure, "Debug session closed"),
                    Err(e) => {
                        warn!(error = %e, "Debug session failed");
                        // The output pump has stopped, so this is the only writer.
                        let _ = tx.send(Err(e.into())).await;
                    }
                }
            }
            .instrument(span),
        );

        Ok(ReceiverStream::new(rx))
    }
}

#[tonic::async_trait]
impl DebugService for DebugServiceImpl {
    type StreamingOpenStream = DebugResponseStream;

    #[instrument(skip(self, request), fields(rpc = METHOD_STREAMING_OPEN))]
    async fn streaming_open(
        &self,
        request: Request<Streaming<StreamingOpenRequest>>,
    ) -> Result<Response<Self::StreamingOpenStream>, Status> {
        let out_stream = self.open_session(request.into_inner())?;
        Ok(Response::new(Box::pin(out_stream)))
    }
}
