//! PTY-backed exec channel
//!
//! A pump task drains the russh channel and routes regular data to the
//! stdout pipe and extended data (stderr) to the stderr pipe. Pipe writes
//! block when the reader falls behind, which stalls the channel window and
//! in turn the remote `tail`.

use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg, Pty};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;
use tokio_util::task::AbortOnDropHandle;

use rt_core::traits::{OutputPipe, PtyRequest, RemoteShell, TerminalMode};
use rt_core::{StreamKind, TailError};

/// In-memory buffer between the pump and each line reader
const PIPE_BUFFER_SIZE: usize = 64 * 1024;

/// SSH extended data type code for stderr
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// How the remote command ended
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ExitOutcome {
    status: Option<u32>,
    signal: Option<String>,
}

/// One exec channel on an SSH connection
pub struct SshShell {
    host: String,
    channel: Option<Channel<Msg>>,
    stdout_reader: Option<DuplexStream>,
    stdout_writer: Option<DuplexStream>,
    stderr_reader: Option<DuplexStream>,
    stderr_writer: Option<DuplexStream>,
    /// Aborted (dropping both writers) if the shell is dropped early
    pump: Option<AbortOnDropHandle<ExitOutcome>>,
}

impl SshShell {
    pub(crate) fn new(host: String, channel: Channel<Msg>) -> Self {
        let (stdout_reader, stdout_writer) = tokio::io::duplex(PIPE_BUFFER_SIZE);
        let (stderr_reader, stderr_writer) = tokio::io::duplex(PIPE_BUFFER_SIZE);

        Self {
            host,
            channel: Some(channel),
            stdout_reader: Some(stdout_reader),
            stdout_writer: Some(stdout_writer),
            stderr_reader: Some(stderr_reader),
            stderr_writer: Some(stderr_writer),
            pump: None,
        }
    }

    fn take_pipe(
        reader: &mut Option<DuplexStream>,
        host: &str,
        stream: StreamKind,
    ) -> Result<OutputPipe, TailError> {
        reader
            .take()
            .map(|r| Box::new(r) as OutputPipe)
            .ok_or_else(|| TailError::Pipe {
                host: host.to_string(),
                stream,
                reason: "pipe already taken".to_string(),
            })
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<(), TailError> {
        let host = self.host.clone();
        let pty_error = |reason: String| TailError::Pty {
            host: host.clone(),
            reason,
        };

        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| pty_error("command already started".to_string()))?;

        let modes: Vec<(Pty, u32)> = request
            .modes
            .iter()
            .map(|(mode, value)| (pty_opcode(*mode), *value))
            .collect();

        channel
            .request_pty(true, &request.term, request.cols, request.rows, 0, 0, &modes)
            .await
            .map_err(|e| pty_error(e.to_string()))?;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => {
                    return Err(pty_error("request refused by server".to_string()))
                }
                Some(_) => continue,
                None => return Err(pty_error("channel closed".to_string())),
            }
        }
    }

    fn stdout_pipe(&mut self) -> Result<OutputPipe, TailError> {
        Self::take_pipe(&mut self.stdout_reader, &self.host, StreamKind::Primary)
    }

    fn stderr_pipe(&mut self) -> Result<OutputPipe, TailError> {
        Self::take_pipe(&mut self.stderr_reader, &self.host, StreamKind::Diagnostic)
    }

    async fn start(&mut self, script: &str) -> Result<(), TailError> {
        let start_error = |reason: String| TailError::ExecStart {
            host: self.host.clone(),
            reason,
        };

        let mut channel = self
            .channel
            .take()
            .ok_or_else(|| start_error("command already started".to_string()))?;

        // Untaken readers would block the pump forever; drop them so writes fail fast.
        self.stdout_reader = None;
        self.stderr_reader = None;
        let stdout = self.stdout_writer.take();
        let stderr = self.stderr_writer.take();

        channel
            .exec(true, script)
            .await
            .map_err(|e| start_error(e.to_string()))?;

        let (started_tx, started_rx) = oneshot::channel();
        let host = self.host.clone();
        self.pump = Some(AbortOnDropHandle::new(tokio::spawn(pump(
            host, channel, stdout, stderr, started_tx,
        ))));

        match started_rx.await {
            Ok(Ok(())) => {
                tracing::debug!(host = %self.host, "Started: {}", script);
                Ok(())
            }
            Ok(Err(reason)) => Err(start_error(reason)),
            Err(_) => Err(start_error(
                "channel closed before the command started".to_string(),
            )),
        }
    }

    async fn wait(&mut self) -> Result<(), TailError> {
        let pump = self.pump.take().ok_or_else(|| TailError::ExecWait {
            host: self.host.clone(),
            reason: "command not started".to_string(),
        })?;

        let outcome = pump.await.map_err(|e| TailError::ExecWait {
            host: self.host.clone(),
            reason: format!("output pump failed: {}", e),
        })?;

        exit_result(&self.host, outcome)
    }
}

/// Drain the channel until it closes
async fn pump(
    host: String,
    mut channel: Channel<Msg>,
    mut stdout: Option<DuplexStream>,
    mut stderr: Option<DuplexStream>,
    started: oneshot::Sender<Result<(), String>>,
) -> ExitOutcome {
    let mut started = Some(started);
    let mut outcome = ExitOutcome::default();

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Success => signal_started(&mut started, Ok(())),
            ChannelMsg::Failure => {
                signal_started(&mut started, Err("exec refused by server".to_string()));
                break;
            }
            ChannelMsg::Data { data } => {
                signal_started(&mut started, Ok(()));
                forward(&host, &mut stdout, &data, StreamKind::Primary).await;
            }
            ChannelMsg::ExtendedData { data, ext } => {
                signal_started(&mut started, Ok(()));
                if ext == SSH_EXTENDED_DATA_STDERR {
                    forward(&host, &mut stderr, &data, StreamKind::Diagnostic).await;
                }
            }
            ChannelMsg::ExitStatus { exit_status } => outcome.status = Some(exit_status),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                outcome.signal = Some(format!("{:?}", signal_name))
            }
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    tracing::debug!(host = %host, ?outcome, "Channel closed");
    outcome
}

fn signal_started(
    started: &mut Option<oneshot::Sender<Result<(), String>>>,
    result: Result<(), String>,
) {
    if let Some(tx) = started.take() {
        let _ = tx.send(result);
    }
}

/// Write a chunk to a pipe; a pipe whose reader is gone is dropped
async fn forward(host: &str, pipe: &mut Option<DuplexStream>, data: &[u8], stream: StreamKind) {
    if let Some(writer) = pipe.as_mut() {
        if writer.write_all(data).await.is_err() {
            tracing::debug!(host = %host, %stream, "Reader gone, discarding further output");
            *pipe = None;
        }
    }
}

fn pty_opcode(mode: TerminalMode) -> Pty {
    match mode {
        TerminalMode::Echo => Pty::ECHO,
        TerminalMode::InputSpeed => Pty::TTY_OP_ISPEED,
        TerminalMode::OutputSpeed => Pty::TTY_OP_OSPEED,
    }
}

fn exit_result(host: &str, outcome: ExitOutcome) -> Result<(), TailError> {
    let reason = match outcome {
        ExitOutcome {
            status: Some(0), ..
        } => return Ok(()),
        ExitOutcome {
            signal: Some(signal),
            ..
        } => format!("killed by signal {}", signal),
        ExitOutcome {
            status: Some(status),
            ..
        } => format!("process exited with status {}", status),
        ExitOutcome { .. } => "session closed without exit status".to_string(),
    };

    Err(TailError::ExecWait {
        host: host.to_string(),
        reason,
    })
}
