//! Remote tail executor
//!
//! Follows one file on one host. The primary and diagnostic streams are read
//! concurrently, each line decorated and published as a [`Message`]. The
//! executor only reports success once both readers have drained and the
//! remote command has exited.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use rt_core::traits::{Connector, OutputPipe, PtyRequest, RemoteSession};
use rt_core::{Message, ServerTarget, StreamKind, TailError};

use crate::aggregator::Publisher;
use crate::transform::LineStyle;

/// Line counts of a finished executor
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TailReport {
    /// Lines read from stdout
    pub primary_lines: u64,
    /// Lines read from stderr
    pub diagnostic_lines: u64,
}

/// Follows one (host, path) pair
pub struct TailExecutor {
    target: Arc<ServerTarget>,
    host: String,
    path: String,
    script: String,
    pty: PtyRequest,
}

impl TailExecutor {
    /// Executor for `path` on `target`
    pub fn new(target: Arc<ServerTarget>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            host: target.address(),
            script: follow_command(&path),
            target,
            path,
            pty: PtyRequest::default(),
        }
    }

    /// Host address used to tag messages
    pub fn host(&self) -> &str {
        &self.host
    }

    /// File being followed
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Command run on the remote host
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Connect, follow the file until the remote command ends, and release
    /// the session on every exit path.
    pub async fn run(
        &self,
        connector: &dyn Connector,
        publisher: Publisher,
        cancel: CancellationToken,
    ) -> Result<TailReport, TailError> {
        let mut session = tokio::select! {
            _ = cancel.cancelled() => return Err(self.cancelled()),
            session = connector.connect(&self.target) => session?,
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(self.cancelled()),
            result = self.follow(session.as_mut(), publisher) => result,
        };

        if let Err(e) = session.close().await {
            tracing::debug!(host = %self.host, "Failed to close session: {}", e);
        }

        result
    }

    async fn follow(
        &self,
        session: &mut dyn RemoteSession,
        publisher: Publisher,
    ) -> Result<TailReport, TailError> {
        let mut shell = session.new_shell().await?;
        shell.request_pty(&self.pty).await?;
        let stdout = shell.stdout_pipe()?;
        let stderr = shell.stderr_pipe()?;

        let diagnostic = AbortOnDropHandle::new(tokio::spawn(
            self.forwarder(StreamKind::Diagnostic, publisher.clone())
                .run(stderr),
        ));

        let execute = async {
            shell.start(&self.script).await?;
            shell.wait().await
        };
        let primary = self.forwarder(StreamKind::Primary, publisher).run(stdout);

        let ((), primary_lines) = tokio::try_join!(execute, primary)?;

        let diagnostic_lines = diagnostic.await.map_err(|e| TailError::Read {
            host: self.host.clone(),
            stream: StreamKind::Diagnostic,
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })??;

        tracing::info!(
            host = %self.host,
            path = %self.path,
            primary_lines,
            diagnostic_lines,
            "Tail finished"
        );

        Ok(TailReport {
            primary_lines,
            diagnostic_lines,
        })
    }

    fn forwarder(&self, stream: StreamKind, publisher: Publisher) -> LineForwarder {
        LineForwarder {
            host: self.host.clone(),
            path: self.path.clone(),
            stream,
            style: LineStyle::for_stream(stream),
            publisher,
        }
    }

    fn cancelled(&self) -> TailError {
        TailError::Cancelled {
            host: self.host.clone(),
        }
    }
}

/// `tail -f <path>`; the path is left unquoted so remote globs expand
fn follow_command(path: &str) -> String {
    format!("tail -f {}", path)
}

/// Splits one output stream into lines and publishes them
struct LineForwarder {
    host: String,
    path: String,
    stream: StreamKind,
    style: LineStyle,
    publisher: Publisher,
}

impl LineForwarder {
    /// Read until end-of-stream, returning the number of lines published.
    ///
    /// A final line without terminator is still published; invalid UTF-8 is
    /// replaced rather than treated as an error.
    async fn run(self, pipe: OutputPipe) -> Result<u64, TailError> {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::with_capacity(256);
        let mut lines = 0u64;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|source| TailError::Read {
                    host: self.host.clone(),
                    stream: self.stream,
                    source,
                })?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            let message = Message::new(
                self.host.clone(),
                self.path.clone(),
                self.style.apply(&line),
                self.stream,
            );

            self.publisher
                .publish(message)
                .await
                .map_err(|_| TailError::ChannelClosed {
                    host: self.host.clone(),
                })?;
            lines += 1;
        }

        tracing::debug!(host = %self.host, path = %self.path, stream = %self.stream, lines, "Stream ended");
        Ok(lines)
    }
}
