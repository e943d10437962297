//! Debugger process launching.
//!
//! The launcher resolves the debugger command line from the recipe properties
//! and starts it with piped stdio. After launch it never looks at the process
//! again; liveness belongs to the session controller through
//! [`ProcessControl`].

use std::io;
use std::process::Stdio;

use dbgbridge_core::config::{DEBUG_PATTERN_KEY, DebugSettings, PathSettings};
use dbgbridge_core::{CommandLine, Properties, RecipeError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::config::DebugConfig;
use super::error::DebugError;

/// Liveness control over a launched debugger.
#[tonic::async_trait]
pub trait ProcessControl: Send {
    /// Force the process to stop. Terminating an exited process succeeds.
    async fn terminate(&mut self) -> io::Result<()>;

    /// Wait for the process to exit, returning its exit code if it has one.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// A started debugger with its byte endpoints.
pub struct DebugProcess {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub control: Box<dyn ProcessControl>,
}

impl std::fmt::Debug for DebugProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugProcess").finish_non_exhaustive()
    }
}

/// Starts a debugger for a validated configuration.
pub trait Launcher: Send + Sync {
    fn launch(&self, config: &DebugConfig) -> Result<DebugProcess, DebugError>;
}

/// [`ProcessControl`] over a real child process.
#[derive(Debug)]
pub struct ChildControl {
    child: Child,
}

impl ChildControl {
    pub const fn new(child: Child) -> Self {
        Self { child }
    }
}

#[tonic::async_trait]
impl ProcessControl for ChildControl {
    async fn terminate(&mut self) -> io::Result<()> {
        if let Some(status) = self.child.try_wait()? {
            debug!(?status, "Debugger already exited");
            return Ok(());
        }
        match self.child.start_kill() {
            // Reaped between try_wait and start_kill.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        self.child.wait().await.map(|status| status.code())
    }
}

/// Spawns the debugger described by the `debug.pattern` recipe.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    base: Properties,
}

impl ProcessLauncher {
    /// Build from settings: tool properties, pattern, then `runtime.*` paths.
    pub fn new(debug: &DebugSettings, paths: &PathSettings) -> Self {
        let mut base = debug.recipe_properties();
        base.merge(&paths.recipe_properties());

        let tools = base.sub_tree("tools");
        if tools.is_empty() {
            warn!("No tools.* properties configured for the debug recipe");
        } else {
            debug!(count = tools.len(), ?tools, "Debugger tool properties");
        }
        Self { base }
    }

    pub const fn from_properties(base: Properties) -> Self {
        Self { base }
    }

    /// Resolve the command line for `config` without starting anything.
    pub fn command_line(&self, config: &DebugConfig) -> Result<CommandLine, RecipeError> {
        let mut props = self.base.clone();
        props.merge(&config.recipe_properties());
        props.resolve_command(DEBUG_PATTERN_KEY)
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, config: &DebugConfig) -> Result<DebugProcess, DebugError> {
        let line = self
            .command_line(config)
            .map_err(|e| DebugError::ProcessSpawnFailed {
                reason: e.to_string(),
            })?;

        info!(command = %line, "Spawning debugger");
        let mut child = Command::new(&line.program)
            .args(&line.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DebugError::ProcessSpawnFailed {
                reason: format!("{}: {e}", line.program),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DebugError::ProcessSpawnFailed {
                reason: "Failed to capture stdin".to_string(),
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DebugError::ProcessSpawnFailed {
                reason: "Failed to capture stdout".to_string(),
            })?;

        // stderr is not part of the bridged stream; keep it for diagnostics.
        if let Some(stderr) = child.stderr.take() {
            let pid = child.id();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(?pid, "debugger stderr: {}", line);
                }
            });
        }

        debug!(pid = ?child.id(), "Debugger started");
        Ok(DebugProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            control: Box::new(ChildControl::new(child)),
        })
    }
}
