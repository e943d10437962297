//! gRPC server for the dbgbridge daemon.
//!
//! Provides TCP and local socket server implementations.

mod config;
mod debug_svc;

pub use config::ServerConfig;
pub use debug_svc::DebugServiceImpl;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::transport::server::Router;
use tracing::info;

use dbgbridge_proto::methods::DEBUG_SERVICE_NAME;
use dbgbridge_proto::v1::debug_service_server::DebugServiceServer;
use tonic_health::ServingStatus;

use crate::debug::Launcher;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// gRPC server handle.
pub struct GrpcServer {
    config: ServerConfig,
    debug_service: DebugServiceImpl,
}

impl GrpcServer {
    /// Create a new gRPC server around a debugger launcher.
    pub fn new(config: ServerConfig, launcher: Arc<dyn Launcher>) -> Self {
        let debug_service =
            DebugServiceImpl::new(launcher, config.read_buffer_size, config.max_sessions);
        Self {
            config,
            debug_service,
        }
    }

    /// Get the server configuration.
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get a handle to the debug service sharing this server's session limit.
    pub fn debug_service(&self) -> DebugServiceImpl {
        self.debug_service.clone()
    }

    async fn router(self) -> Router {
        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_service_status(DEBUG_SERVICE_NAME, ServingStatus::Serving)
            .await;

        Server::builder()
            .http2_keepalive_interval(Some(self.config.keepalive_interval))
            .http2_keepalive_timeout(Some(self.config.keepalive_timeout))
            .add_service(health_service)
            .add_service(DebugServiceServer::new(self.debug_service))
    }

    /// Serve on the configured TCP address until `shutdown` resolves.
    pub async fn serve_tcp<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self
            .config
            .tcp_addr
            .ok_or_else(|| ServerError::Config("no TCP address configured".into()))?;
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound TCP listener until `shutdown` resolves.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let addr: SocketAddr = listener.local_addr()?;
        let incoming = TcpListenerStream::new(listener);
        info!(%addr, "Starting gRPC server on TCP");

        self.router()
            .await
            .serve_with_incoming_shutdown(incoming, shutdown)
            .await?;

        info!("gRPC server stopped");
        Ok(())
    }

    /// Serve on the configured Unix socket until `shutdown` resolves.
    #[cfg(unix)]
    pub async fn serve_unix<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        use tokio::net::UnixListener;
        use tokio_stream::wrappers::UnixListenerStream;

        let path = self
            .config
            .unix_socket
            .clone()
            .ok_or_else(|| ServerError::Config("no Unix socket path configured".into()))?;

        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&path)?;
        let incoming = UnixListenerStream::new(listener);
        info!(path = %path.display(), "Starting gRPC server on Unix socket");

        self.router()
            .await
            .serve_with_incoming_shutdown(incoming, shutdown)
            .await?;

        info!("gRPC server stopped");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::debug::test_helpers::SpyLauncher;

    #[tokio::test]
    async fn serve_tcp_requires_address() {
        let (launcher, _debugger) = SpyLauncher::new();
        let mut config = ServerConfig::default();
        config.tcp_addr = None;
        let server = GrpcServer::new(config, launcher);

        let err = server.serve_tcp(std::future::ready(())).await.unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[tokio::test]
    async fn service_shares_session_limit() {
        let (launcher, _debugger) = SpyLauncher::new();
        let server = GrpcServer::new(ServerConfig::default().with_max_sessions(3), launcher);
        assert_eq!(server.config().max_sessions, 3);
        assert_eq!(server.debug_service().active_sessions(), 0);
    }

    #[test]
    fn health_name_matches_generated_service() {
        use tonic::server::NamedService;
        assert_eq!(
            <DebugServiceServer<DebugServiceImpl> as NamedService>::NAME,
            DEBUG_SERVICE_NAME
        );
        assert!(
            dbgbridge_proto::methods::METHOD_STREAMING_OPEN
                .starts_with(DEBUG_SERVICE_NAME.rsplit('.').next().unwrap_or_default())
        );
    }
}
