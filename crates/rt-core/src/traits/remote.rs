//! Remote shell traits

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::TailError;
use crate::types::ServerTarget;

/// Reader over one output stream of a remote command
pub type OutputPipe = Box<dyn AsyncRead + Send + Unpin>;

/// Terminal mode opcodes sent with a PTY request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    /// Local echo on/off
    Echo,
    /// Input baud rate
    InputSpeed,
    /// Output baud rate
    OutputSpeed,
}

/// Parameters of a pseudo-terminal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    /// `TERM` value
    pub term: String,
    /// Width in characters
    pub cols: u32,
    /// Height in rows
    pub rows: u32,
    /// Terminal modes
    pub modes: Vec<(TerminalMode, u32)>,
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self {
            term: "xterm".to_string(),
            cols: 80,
            rows: 40,
            modes: vec![
                (TerminalMode::Echo, 0),
                (TerminalMode::InputSpeed, 14400),
                (TerminalMode::OutputSpeed, 14400),
            ],
        }
    }
}

/// Opens authenticated sessions to remote hosts
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and authenticate to `target`
    async fn connect(&self, target: &ServerTarget) -> Result<Box<dyn RemoteSession>, TailError>;
}

/// An authenticated connection to one host
#[async_trait]
pub trait RemoteSession: Send {
    /// Open a new command channel
    async fn new_shell(&mut self) -> Result<Box<dyn RemoteShell>, TailError>;

    /// Release the connection
    async fn close(&mut self) -> Result<(), TailError>;
}

/// A command channel on a remote host.
///
/// Both pipes must be taken before [`RemoteShell::start`]; they reach
/// end-of-stream once the command exits or the shell is dropped.
#[async_trait]
pub trait RemoteShell: Send {
    /// Allocate a pseudo-terminal for the command
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<(), TailError>;

    /// Take the standard output reader
    fn stdout_pipe(&mut self) -> Result<OutputPipe, TailError>;

    /// Take the standard error reader
    fn stderr_pipe(&mut self) -> Result<OutputPipe, TailError>;

    /// Run `script` on the remote host
    async fn start(&mut self, script: &str) -> Result<(), TailError>;

    /// Wait for the command to exit
    async fn wait(&mut self) -> Result<(), TailError>;
}
