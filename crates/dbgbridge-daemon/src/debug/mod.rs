//! Debug sessions: one client stream bridged to one debugger process.

pub mod config;
pub mod error;
pub mod handshake;
pub mod launcher;
pub mod pump;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::DebugConfig;
pub use error::{DebugError, Origin};
pub use handshake::handshake;
pub use launcher::{ChildControl, DebugProcess, Launcher, ProcessControl, ProcessLauncher};
pub use pump::{InboundStream, OutboundSender, TerminalSignal, input_pump, output_pump};
pub use session::{Closure, DebugSession, SessionState};
