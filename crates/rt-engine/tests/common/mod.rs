//! Shared fakes for engine integration tests
//!
//! `FakeConnector` serves scripted hosts: each host maps tailed paths to the
//! bytes its stdout/stderr produce and how the command exits. Output is
//! written through small in-memory pipes so readers see real backpressure.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::task::JoinHandle;

use rt_core::traits::{
    Connector, OutputPipe, PtyRequest, RemoteSession, RemoteShell, Sink,
};
use rt_core::types::Credential;
use rt_core::{Message, ServerTarget, SinkError, StreamKind, TailError};
use rt_engine::OperatorOutput;

/// Script of one followed file
#[derive(Clone, Default)]
pub struct FakeFile {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `Some(reason)` makes `wait` fail
    pub wait_error: Option<String>,
    /// Never exit (until the session is torn down)
    pub hang: bool,
}

impl FakeFile {
    pub fn lines(stdout: &str) -> Self {
        Self {
            stdout: stdout.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.as_bytes().to_vec();
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.wait_error = Some(reason.to_string());
        self
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }
}

/// Step of the shell setup that goes wrong on a faulty host
#[derive(Clone, Copy, Debug)]
pub enum ShellFault {
    /// `new_shell` fails
    NewShell,
    /// `request_pty` fails
    Pty,
    /// `stdout_pipe` fails
    StdoutPipe,
    /// stdout yields one line, then a read error
    BrokenStdout,
}

/// Line a `BrokenStdout` host delivers before its read error
pub const BROKEN_STDOUT_LINE: &str = "last words\n";

/// Behavior of one host
#[derive(Clone)]
pub enum FakeHost {
    Files(HashMap<String, FakeFile>),
    RefuseConnection,
    PanicOnConnect,
    Faulty(ShellFault),
}

impl FakeHost {
    pub fn file(path: &str, file: FakeFile) -> Self {
        FakeHost::Files(HashMap::from([(path.to_string(), file)]))
    }
}

/// Connector over scripted hosts, keyed by `address()`
#[derive(Default)]
pub struct FakeConnector {
    hosts: HashMap<String, FakeHost>,
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, address: &str, host: FakeHost) -> Self {
        self.hosts.insert(address.to_string(), host);
        self
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, target: &ServerTarget) -> Result<Box<dyn RemoteSession>, TailError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let address = target.address();

        match self.hosts.get(&address) {
            Some(FakeHost::Files(files)) => Ok(Box::new(FakeSession {
                host: address,
                files: files.clone(),
                fault: None,
                closes: Arc::clone(&self.closes),
            })),
            Some(FakeHost::Faulty(fault)) => Ok(Box::new(FakeSession {
                host: address,
                files: HashMap::new(),
                fault: Some(*fault),
                closes: Arc::clone(&self.closes),
            })),
            Some(FakeHost::PanicOnConnect) => panic!("fake connector exploded for {}", address),
            Some(FakeHost::RefuseConnection) | None => Err(TailError::Connect {
                host: address,
                reason: "connection refused".to_string(),
            }),
        }
    }
}

struct FakeSession {
    host: String,
    files: HashMap<String, FakeFile>,
    fault: Option<ShellFault>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn new_shell(&mut self) -> Result<Box<dyn RemoteShell>, TailError> {
        if let Some(ShellFault::NewShell) = self.fault {
            return Err(TailError::Session {
                host: self.host.clone(),
                reason: "administratively prohibited".to_string(),
            });
        }

        let (stdout_reader, stdout_writer) = tokio::io::duplex(16);
        let (stderr_reader, stderr_writer) = tokio::io::duplex(16);
        Ok(Box::new(FakeShell {
            host: self.host.clone(),
            files: self.files.clone(),
            stdout_reader: Some(stdout_reader),
            stderr_reader: Some(stderr_reader),
            writers: Some((stdout_writer, stderr_writer)),
            writer_task: None,
            pty_requested: false,
            fault: self.fault,
        }))
    }

    async fn close(&mut self) -> Result<(), TailError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeShell {
    host: String,
    files: HashMap<String, FakeFile>,
    stdout_reader: Option<DuplexStream>,
    stderr_reader: Option<DuplexStream>,
    writers: Option<(DuplexStream, DuplexStream)>,
    writer_task: Option<JoinHandle<Option<String>>>,
    pty_requested: bool,
    fault: Option<ShellFault>,
}

impl Drop for FakeShell {
    fn drop(&mut self) {
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<(), TailError> {
        assert_eq!(request.term, "xterm");
        if let Some(ShellFault::Pty) = self.fault {
            return Err(TailError::Pty {
                host: self.host.clone(),
                reason: "request refused by server".to_string(),
            });
        }
        self.pty_requested = true;
        Ok(())
    }

    fn stdout_pipe(&mut self) -> Result<OutputPipe, TailError> {
        match self.fault {
            Some(ShellFault::StdoutPipe) => {
                return Err(TailError::Pipe {
                    host: self.host.clone(),
                    stream: StreamKind::Primary,
                    reason: "channel refused".to_string(),
                })
            }
            Some(ShellFault::BrokenStdout) => {
                return Ok(Box::new(BrokenPipe::new(BROKEN_STDOUT_LINE.as_bytes())))
            }
            _ => {}
        }
        self.stdout_reader
            .take()
            .map(|r| Box::new(r) as OutputPipe)
            .ok_or_else(|| TailError::Pipe {
                host: self.host.clone(),
                stream: StreamKind::Primary,
                reason: "taken".to_string(),
            })
    }

    fn stderr_pipe(&mut self) -> Result<OutputPipe, TailError> {
        self.stderr_reader
            .take()
            .map(|r| Box::new(r) as OutputPipe)
            .ok_or_else(|| TailError::Pipe {
                host: self.host.clone(),
                stream: StreamKind::Diagnostic,
                reason: "taken".to_string(),
            })
    }

    async fn start(&mut self, script: &str) -> Result<(), TailError> {
        assert!(self.pty_requested, "pty must be requested before start");
        let path = script.strip_prefix("tail -f ").unwrap_or(script);
        let (mut stdout, mut stderr) = self.writers.take().expect("started twice");

        if let Some(ShellFault::BrokenStdout) = self.fault {
            // The command keeps running; only the stdout read breaks
            drop((stdout, stderr));
            self.writer_task = Some(tokio::spawn(std::future::pending::<Option<String>>()));
            return Ok(());
        }

        let file = self.files.get(path).cloned().ok_or_else(|| TailError::ExecStart {
            host: self.host.clone(),
            reason: format!("tail: cannot open '{}'", path),
        })?;

        self.writer_task = Some(tokio::spawn(async move {
            let out = async {
                let _ = stdout.write_all(&file.stdout).await;
                drop(stdout);
            };
            let err = async {
                let _ = stderr.write_all(&file.stderr).await;
                drop(stderr);
            };
            tokio::join!(out, err);
            if file.hang {
                std::future::pending::<()>().await;
            }
            file.wait_error
        }));
        Ok(())
    }

    async fn wait(&mut self) -> Result<(), TailError> {
        let task = self.writer_task.as_mut().expect("not started");
        match task.await {
            Ok(None) => Ok(()),
            Ok(Some(reason)) => Err(TailError::ExecWait {
                host: self.host.clone(),
                reason,
            }),
            Err(e) => Err(TailError::ExecWait {
                host: self.host.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Reader that yields `data`, then fails like a reset connection
pub struct BrokenPipe {
    data: Vec<u8>,
    pos: usize,
}

impl BrokenPipe {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
        }
    }
}

impl AsyncRead for BrokenPipe {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos < self.data.len() {
            let n = buf.remaining().min(self.data.len() - self.pos);
            let start = self.pos;
            buf.put_slice(&self.data[start..start + n]);
            self.pos += n;
            return Poll::Ready(Ok(()));
        }
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}

/// Sink that records every message
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<Message>>,
    pub closes: AtomicUsize,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn published(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn publish(&self, message: &Message) -> Result<(), SinkError> {
        self.messages.lock().unwrap().push(message.clone());
        if self.fail {
            return Err(SinkError::Transport("broker down".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Operator output that keeps everything in memory
#[derive(Default)]
pub struct CapturedOutput {
    pub messages: Mutex<Vec<Message>>,
    pub errors: Mutex<Vec<String>>,
}

impl CapturedOutput {
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn messages_from(&self, host: &str) -> Vec<Message> {
        self.messages()
            .into_iter()
            .filter(|m| m.host() == host)
            .collect()
    }
}

impl OperatorOutput for CapturedOutput {
    fn message(&self, message: &Message) {
        self.messages.lock().unwrap().push(message.clone());
    }

    fn error(&self, text: &str) {
        self.errors.lock().unwrap().push(text.to_string());
    }

    fn notice(&self, _text: &str) {}
}

/// Target `name` at `hostname` (port 22) following `paths`
pub fn target(name: &str, hostname: &str, paths: &[&str]) -> ServerTarget {
    ServerTarget {
        name: name.to_string(),
        hostname: hostname.to_string(),
        port: 22,
        user: "root".to_string(),
        credential: Credential::Password("secret".to_string()),
        host_key: None,
        file_paths: paths.iter().map(|p| p.to_string()).collect(),
    }
}
