//! Debug session lifecycle controller.
//!
//! ```text
//! Handshaking ──▶ Running ──▶ Draining ──▶ Closed
//!      │                                     ▲
//!      └──────── handshake/launch error ─────┘
//! ```
//!
//! The controller owns the single termination decision: the first
//! [`TerminalSignal`] from either pump decides the session outcome, every later
//! signal is only logged.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, info, instrument, warn};

use super::error::{DebugError, Origin};
use super::handshake::handshake;
use super::launcher::{DebugProcess, Launcher};
use super::pump::{InboundStream, OutboundSender, TerminalSignal, input_pump, output_pump};

/// One signal per pump, so sends never block.
const SIGNAL_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Running,
    Draining,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Handshaking => "handshaking",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Graceful session endings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// The client closed its stream.
    StreamClosed,
    /// The debugger closed its output.
    ProcessExited,
}

/// A single client stream bridged to a single debugger process.
pub struct DebugSession {
    id: String,
    launcher: Arc<dyn Launcher>,
    read_buffer_size: usize,
    state: watch::Sender<SessionState>,
}

impl DebugSession {
    pub fn new(launcher: Arc<dyn Launcher>, read_buffer_size: usize) -> Self {
        let (state, _) = watch::channel(SessionState::Handshaking);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            launcher,
            read_buffer_size,
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        debug!(from = %prev, to = %next, "Session state changed");
    }

    /// Run the session to completion.
    ///
    /// Returns the cause carried by the first terminal signal. The debugger,
    /// if started, has been terminated and reaped when this returns, and the
    /// output pump has stopped, so the caller is the only remaining writer
    /// on `outbound`.
    #[instrument(skip_all, fields(session_id = %self.id))]
    pub async fn run<S: InboundStream>(
        self,
        mut inbound: S,
        outbound: OutboundSender,
    ) -> Result<Closure, DebugError> {
        let config = match handshake(&mut inbound).await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Handshake failed");
                self.transition(SessionState::Closed);
                return Err(e);
            }
        };

        let DebugProcess {
            stdin,
            stdout,
            mut control,
        } = match self.launcher.launch(&config) {
            Ok(process) => process,
            Err(e) => {
                warn!(error = %e, "Debugger launch failed");
                self.transition(SessionState::Closed);
                return Err(e);
            }
        };

        self.transition(SessionState::Running);
        let (signal_tx, mut signal_rx) = mpsc::channel(SIGNAL_CAPACITY);
        // Detached once the session closes: it ends on its own when the
        // stream closes or the dead debugger's stdin rejects a write.
        let _input = tokio::spawn(
            input_pump(inbound, stdin, signal_tx.clone()).in_current_span(),
        );
        let output = tokio::spawn(
            output_pump(stdout, outbound, self.read_buffer_size, signal_tx).in_current_span(),
        );

        let first = signal_rx.recv().await;
        self.transition(SessionState::Draining);
        if let Some(signal) = &first {
            info!(origin = %signal.origin, error = ?signal.error, "Session terminating");
        }

        if let Err(e) = control.terminate().await {
            warn!(error = %e, "Failed to terminate debugger");
        }
        match control.wait().await {
            Ok(code) => debug!(?code, "Debugger exited"),
            Err(e) => warn!(error = %e, "Failed to wait for debugger"),
        }

        if let Err(e) = output.await {
            warn!(error = %e, "Output pump task failed");
        }
        while let Ok(signal) = signal_rx.try_recv() {
            debug!(origin = %signal.origin, error = ?signal.error, "Discarding later terminal signal");
        }

        self.transition(SessionState::Closed);
        match first {
            Some(TerminalSignal { error: Some(e), .. }) => Err(e),
            Some(TerminalSignal {
                origin: Origin::Stream,
                error: None,
            }) => Ok(Closure::StreamClosed),
            Some(TerminalSignal {
                origin: Origin::Process,
                error: None,
            }) => Ok(Closure::ProcessExited),
            None => Err(DebugError::Internal(
                "pumps stopped without reporting a cause".into(),
            )),
        }
    }
}
