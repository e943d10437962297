//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use dbgbridge_core::Settings;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP bind address (if using TCP transport).
    pub tcp_addr: Option<SocketAddr>,

    /// Unix socket path (if using Unix transport).
    pub unix_socket: Option<PathBuf>,

    /// Maximum concurrent debug sessions.
    pub max_sessions: usize,

    /// Output pump read buffer size in bytes.
    pub read_buffer_size: usize,

    /// HTTP/2 keepalive ping interval.
    pub keepalive_interval: Duration,

    /// HTTP/2 keepalive ping timeout.
    pub keepalive_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ServerConfig {
    /// Derive the server configuration from resolved settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            tcp_addr: Some(settings.daemon.addr),
            unix_socket: settings.daemon.socket_path.clone(),
            max_sessions: settings.daemon.max_sessions,
            read_buffer_size: settings.debug.read_buffer_size,
            keepalive_interval: Duration::from_secs(30),
            keepalive_timeout: Duration::from_secs(10),
        }
    }

    /// Create a new server config with TCP transport.
    pub fn tcp(addr: SocketAddr) -> Self {
        Self {
            tcp_addr: Some(addr),
            unix_socket: None,
            ..Default::default()
        }
    }

    /// Create a new server config with Unix socket transport.
    #[cfg(unix)]
    pub fn unix(path: PathBuf) -> Self {
        Self {
            tcp_addr: None,
            unix_socket: Some(path),
            ..Default::default()
        }
    }

    /// Set max sessions. Zero is raised to one.
    #[must_use]
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.max(1);
        self
    }

    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}
