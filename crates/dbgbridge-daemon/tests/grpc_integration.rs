#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity
#![cfg(unix)]

//! End-to-end tests over a real gRPC transport.
//!
//! The server binds an ephemeral TCP port and spawns `cat` as its debugger,
//! so bytes sent on the stream come straight back.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tonic::Code;
use tonic::transport::Channel;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;

use dbgbridge_core::Properties;
use dbgbridge_proto::methods::DEBUG_SERVICE_NAME;
use dbgbridge_daemon::debug::ProcessLauncher;
use dbgbridge_daemon::server::{GrpcServer, ServerConfig};
use dbgbridge_proto::v1::debug_service_client::DebugServiceClient;
use dbgbridge_proto::v1::streaming_open_request::Content;
use dbgbridge_proto::v1::{DebugConfigRequest, StreamingOpenRequest};

const TIMEOUT: Duration = Duration::from_secs(10);

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(pattern: &str, max_sessions: usize) -> Self {
        let props: Properties = [("debug.pattern", pattern)].into_iter().collect();
        let launcher = Arc::new(ProcessLauncher::from_properties(props));
        let config = ServerConfig::default().with_max_sessions(max_sessions);
        let server = GrpcServer::new(config, launcher);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .serve_listener(listener, async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    async fn client(&self) -> DebugServiceClient<Channel> {
        DebugServiceClient::connect(format!("http://{}", self.addr))
            .await
            .unwrap()
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(TIMEOUT, self.handle)
            .await
            .unwrap()
            .unwrap();
    }
}

fn config_request() -> StreamingOpenRequest {
    StreamingOpenRequest {
        content: Some(Content::DebugRequest(DebugConfigRequest {
            fqbn: "arduino:samd:mkr1000".into(),
            sketch_path: "/sketches/blink".into(),
            port: "/dev/ttyACM0".into(),
            ..DebugConfigRequest::default()
        })),
    }
}

fn data_request(data: &[u8]) -> StreamingOpenRequest {
    StreamingOpenRequest {
        content: Some(Content::Data(data.to_vec())),
    }
}

#[tokio::test]
async fn streaming_open_echoes_through_debugger() {
    let server = TestServer::start("cat", 2).await;
    let mut client = server.client().await;

    let (tx, rx) = mpsc::channel(8);
    tx.send(config_request()).await.unwrap();
    tx.send(data_request(b"-gdb-version\n")).await.unwrap();

    let mut responses = client
        .streaming_open(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();

    let mut received = Vec::new();
    while received.len() < b"-gdb-version\n".len() {
        let frame = tokio::time::timeout(TIMEOUT, responses.message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        received.extend(frame.data);
    }
    assert_eq!(received, b"-gdb-version\n");

    drop(tx);
    let end = tokio::time::timeout(TIMEOUT, responses.message())
        .await
        .unwrap()
        .unwrap();
    assert!(end.is_none());

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn data_before_config_is_invalid_argument() {
    let server = TestServer::start("cat", 2).await;
    let mut client = server.client().await;

    let requests = tokio_stream::iter(vec![data_request(b"x")]);
    let status = match client.streaming_open(requests).await {
        Err(status) => status,
        Ok(response) => tokio::time::timeout(TIMEOUT, response.into_inner().message())
            .await
            .unwrap()
            .unwrap_err(),
    };
    assert_eq!(status.code(), Code::InvalidArgument);

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn unknown_debugger_is_failed_precondition() {
    let server = TestServer::start("/nonexistent/dbgbridge-test-debugger", 2).await;
    let mut client = server.client().await;

    let (tx, rx) = mpsc::channel(8);
    tx.send(config_request()).await.unwrap();

    let status = match client.streaming_open(ReceiverStream::new(rx)).await {
        Err(status) => status,
        Ok(response) => tokio::time::timeout(TIMEOUT, response.into_inner().message())
            .await
            .unwrap()
            .unwrap_err(),
    };
    assert_eq!(status.code(), Code::FailedPrecondition);

    drop(tx);
    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn health_reports_debug_service_serving() {
    let server = TestServer::start("cat", 2).await;
    let channel = Channel::from_shared(format!("http://{}", server.addr))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut health = HealthClient::new(channel);

    let response = health
        .check(HealthCheckRequest {
            service: DEBUG_SERVICE_NAME.to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.status, ServingStatus::Serving as i32);

    drop(health);
    server.stop().await;
}
