//! dbgbridge Daemon
//!
//! Serves `DebugService` over gRPC: each `StreamingOpen` call starts a local
//! debugger and relays raw bytes between the client stream and the
//! debugger's stdin/stdout.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use dbgbridge_core::config::{Settings, load_settings};
use dbgbridge_core::tracing_init;
use dbgbridge_daemon::debug::ProcessLauncher;
use dbgbridge_daemon::server::{GrpcServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "dbgbridge-daemon")]
#[command(version, about = "dbgbridge daemon - gRPC to debugger stdio bridge")]
struct Args {
    /// TCP bind address
    #[arg(long, env = "DBGBRIDGE_ADDR")]
    addr: Option<SocketAddr>,

    /// Serve on a Unix socket instead of TCP
    #[cfg(unix)]
    #[arg(long, env = "DBGBRIDGE_SOCKET")]
    socket: Option<PathBuf>,

    /// Settings file, applied on top of the global settings
    #[arg(long, env = "DBGBRIDGE_SETTINGS")]
    settings: Option<PathBuf>,

    /// Maximum concurrent debug sessions
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Read buffer size for debugger output, in bytes
    #[arg(long)]
    read_buffer_size: Option<usize>,

    /// Debugger command line pattern, e.g. '"{tools.gdb.cmd}" --interpreter=mi2'
    #[arg(long)]
    debug_pattern: Option<String>,

    /// Log level filter for the daemon (e.g. "info", "debug", "warn").
    #[arg(long, env = "DBGBRIDGE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "DBGBRIDGE_LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// CLI arguments take precedence over every settings source.
    fn apply(&self, settings: &mut Settings) {
        if let Some(addr) = self.addr {
            settings.daemon.addr = addr;
        }
        #[cfg(unix)]
        {
            if let Some(socket) = &self.socket {
                settings.daemon.socket_path = Some(socket.clone());
            }
        }
        if let Some(max) = self.max_sessions {
            settings.daemon.max_sessions = max;
        }
        if let Some(size) = self.read_buffer_size {
            settings.debug.read_buffer_size = size;
        }
        if let Some(pattern) = &self.debug_pattern {
            settings.debug.pattern.clone_from(pattern);
        }
        if let Some(level) = &self.log_level {
            settings.daemon.log_level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = load_settings(args.settings.as_deref())?;
    args.apply(&mut settings);

    tracing_init::init_tracing(
        &tracing_init::filter_for("dbgbridge_daemon", &settings.daemon.log_level),
        args.log_json,
    )?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %settings.daemon.addr,
        socket = ?settings.daemon.socket_path,
        max_sessions = settings.daemon.max_sessions,
        pattern = %settings.debug.pattern,
        "Starting dbgbridge-daemon"
    );

    let launcher = Arc::new(ProcessLauncher::new(&settings.debug, &settings.paths));
    let config = ServerConfig::from_settings(&settings);
    let server = GrpcServer::new(config, launcher);

    #[cfg(unix)]
    {
        if settings.daemon.socket_path.is_some() {
            server.serve_unix(shutdown_signal()).await?;
            info!("Daemon stopped");
            return Ok(());
        }
    }

    server.serve_tcp(shutdown_signal()).await?;
    info!("Daemon stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm => {
            info!("Received SIGTERM shutdown signal");
        }
    }
}
