//! Shared fakes for debug session tests.
//!
//! [`SpyLauncher`] hands out a single in-memory debugger built from
//! `tokio::io::duplex` pipes; the test drives the other ends through
//! [`FakeDebugger`]. Terminating the fake closes both pipes, which is what a
//! killed process does to its stdio.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use dbgbridge_proto::v1::streaming_open_request::Content;
use dbgbridge_proto::v1::{DebugConfigRequest, StreamingOpenRequest};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf, duplex};
use tokio::sync::Mutex as AsyncMutex;

use super::config::DebugConfig;
use super::error::DebugError;
use super::launcher::{DebugProcess, Launcher, ProcessControl};

pub fn config_request() -> StreamingOpenRequest {
    StreamingOpenRequest {
        content: Some(Content::DebugRequest(DebugConfigRequest {
            fqbn: "arduino:samd:mkr1000".into(),
            sketch_path: "/sketches/blink".into(),
            port: "/dev/ttyACM0".into(),
            ..DebugConfigRequest::default()
        })),
    }
}

pub fn data_request(data: &[u8]) -> StreamingOpenRequest {
    StreamingOpenRequest {
        content: Some(Content::Data(data.to_vec())),
    }
}

/// A reader that fails on first use.
pub struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::other("debugger pipe broken")))
    }
}

type SharedPipe = Arc<AsyncMutex<Option<DuplexStream>>>;

/// Test-side ends of the fake debugger's stdio.
#[derive(Clone)]
pub struct FakeDebugger {
    stdin: SharedPipe,
    stdout: SharedPipe,
    terminations: Arc<AtomicUsize>,
}

impl FakeDebugger {
    /// Read exactly `n` bytes the bridge wrote to the debugger's stdin.
    pub async fn read_stdin(&self, n: usize) -> io::Result<Vec<u8>> {
        let mut guard = self.stdin.lock().await;
        let pipe = guard.as_mut().ok_or(io::ErrorKind::BrokenPipe)?;
        let mut buf = vec![0u8; n];
        pipe.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Write bytes to the debugger's stdout.
    pub async fn write_stdout(&self, data: &[u8]) -> io::Result<()> {
        let mut guard = self.stdout.lock().await;
        let pipe = guard.as_mut().ok_or(io::ErrorKind::BrokenPipe)?;
        pipe.write_all(data).await?;
        pipe.flush().await
    }

    /// Close stdout as an exiting debugger would.
    pub async fn exit(&self) {
        self.stdout.lock().await.take();
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

struct SpyControl {
    debugger: FakeDebugger,
}

#[tonic::async_trait]
impl ProcessControl for SpyControl {
    async fn terminate(&mut self) -> io::Result<()> {
        self.debugger.terminations.fetch_add(1, Ordering::SeqCst);
        self.debugger.stdin.lock().await.take();
        self.debugger.stdout.lock().await.take();
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(None)
    }
}

/// Launcher that records calls and returns one prepared process.
pub struct SpyLauncher {
    launches: AtomicUsize,
    process: Mutex<Option<DebugProcess>>,
}

impl SpyLauncher {
    /// A launcher whose process is a [`FakeDebugger`].
    pub fn new() -> (Arc<Self>, FakeDebugger) {
        let (stdin_near, stdin_far) = duplex(256);
        let (stdout_far, stdout_near) = duplex(256);
        let debugger = FakeDebugger {
            stdin: Arc::new(AsyncMutex::new(Some(stdin_far))),
            stdout: Arc::new(AsyncMutex::new(Some(stdout_far))),
            terminations: Arc::new(AtomicUsize::new(0)),
        };
        let process = DebugProcess {
            stdin: Box::new(stdin_near),
            stdout: Box::new(stdout_near),
            control: Box::new(SpyControl {
                debugger: debugger.clone(),
            }),
        };
        (Arc::new(Self::with_process(process)), debugger)
    }

    /// A launcher whose process reads fail immediately.
    pub fn with_failing_output() -> (Arc<Self>, FakeDebugger) {
        let (stdin_near, stdin_far) = duplex(256);
        let debugger = FakeDebugger {
            stdin: Arc::new(AsyncMutex::new(Some(stdin_far))),
            stdout: Arc::new(AsyncMutex::new(None)),
            terminations: Arc::new(AtomicUsize::new(0)),
        };
        let process = DebugProcess {
            stdin: Box::new(stdin_near),
            stdout: Box::new(FailingReader),
            control: Box::new(SpyControl {
                debugger: debugger.clone(),
            }),
        };
        (Arc::new(Self::with_process(process)), debugger)
    }

    fn with_process(process: DebugProcess) -> Self {
        Self {
            launches: AtomicUsize::new(0),
            process: Mutex::new(Some(process)),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl Launcher for SpyLauncher {
    fn launch(&self, _config: &DebugConfig) -> Result<DebugProcess, DebugError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.process
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| DebugError::ProcessSpawnFailed {
                reason: "spy launcher already used".into(),
            })
    }
}
