//! Core error types for remote-tail

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::StreamKind;

/// Failure of a single tail task.
///
/// Every variant is scoped to one (host, path) pair: the orchestrator catches
/// it at the task boundary and the remaining hosts keep running.
#[derive(Error, Debug)]
pub enum TailError {
    /// TCP/SSH handshake failed
    #[error("[{host}] unable to connect: {reason}")]
    Connect { host: String, reason: String },

    /// The server rejected our credentials
    #[error("[{host}] authentication rejected for user '{user}'")]
    Auth { host: String, user: String },

    /// Opening the session channel failed
    #[error("[{host}] unable to create session: {reason}")]
    Session { host: String, reason: String },

    /// Pseudo-terminal allocation failed
    #[error("[{host}] unable to create pty: {reason}")]
    Pty { host: String, reason: String },

    /// Output stream could not be acquired
    #[error("[{host}] redirect {stream} failed: {reason}")]
    Pipe {
        host: String,
        stream: StreamKind,
        reason: String,
    },

    /// The remote command could not be started
    #[error("[{host}] failed to execute command: {reason}")]
    ExecStart { host: String, reason: String },

    /// The remote command ended abnormally
    #[error("[{host}] failed to wait command: {reason}")]
    ExecWait { host: String, reason: String },

    /// Reading a line from an output stream failed
    #[error("[{host}] failed to read {stream}: {source}")]
    Read {
        host: String,
        stream: StreamKind,
        #[source]
        source: std::io::Error,
    },

    /// Connecting took longer than the configured limit
    #[error("[{host}] connection timed out after {after:?}")]
    Timeout { host: String, after: Duration },

    /// The task was cancelled by shutdown
    #[error("[{host}] cancelled")]
    Cancelled { host: String },

    /// The aggregator channel is gone
    #[error("[{host}] output channel closed")]
    ChannelClosed { host: String },
}

impl TailError {
    /// Host (address) the failing task belongs to
    pub fn host(&self) -> &str {
        match self {
            TailError::Connect { host, .. }
            | TailError::Auth { host, .. }
            | TailError::Session { host, .. }
            | TailError::Pty { host, .. }
            | TailError::Pipe { host, .. }
            | TailError::ExecStart { host, .. }
            | TailError::ExecWait { host, .. }
            | TailError::Read { host, .. }
            | TailError::Timeout { host, .. }
            | TailError::Cancelled { host }
            | TailError::ChannelClosed { host } => host,
        }
    }

    /// Whether the failure came from a shutdown request rather than the host
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TailError::Cancelled { .. })
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A `user@host[:port]` entry could not be parsed
    #[error("Invalid host entry '{0}', expected user@host[:port]")]
    InvalidHost(String),
}

/// Sink construction and publishing errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// No factory is registered under the requested name
    #[error("unknown backend storage driver: {0}")]
    UnknownDriver(String),

    /// Driver settings are unusable
    #[error("sink configuration error: {0}")]
    Config(String),

    /// Local I/O failed (certificate files, spool file)
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded
    #[error("sink encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The remote end refused or could not be reached
    #[error("sink transport error: {0}")]
    Transport(String),

    /// Publish after close
    #[error("sink is closed")]
    Closed,
}
