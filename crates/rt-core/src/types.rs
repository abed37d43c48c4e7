//! Common types used throughout remote-tail

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which remote output stream a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// The command's standard output
    Primary,
    /// The command's standard error
    Diagnostic,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Primary => write!(f, "stdout"),
            StreamKind::Diagnostic => write!(f, "stderr"),
        }
    }
}

/// One line of remote output, tagged with where it came from.
///
/// Fields are private so a message cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    host: String,
    path: String,
    content: String,
    stream: StreamKind,
}

impl Message {
    /// Create a new message
    pub fn new(
        host: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
        stream: StreamKind,
    ) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            content: content.into(),
            stream,
        }
    }

    /// Originating host, `address:port`
    pub fn host(&self) -> &str {
        &self.host
    }

    /// File being followed on the host
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The line, including its terminator and any prefix/styling
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Stream the line was read from
    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// True for empty content or a bare line terminator
    pub fn is_blank(&self) -> bool {
        matches!(self.content.as_str(), "" | "\n" | "\r\n")
    }

    /// Content with trailing line terminators removed
    pub fn trimmed_content(&self) -> &str {
        self.content.trim_end_matches(['\r', '\n'])
    }
}

/// How to authenticate against a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Password authentication
    Password(String),
    /// Public key authentication with a private key file
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

/// A fully resolved remote host, ready to be tailed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    /// Configuration key of the server
    pub name: String,
    /// Hostname or IP, optionally already carrying `:port`
    pub hostname: String,
    /// SSH port
    pub port: u16,
    /// Login user
    pub user: String,
    /// Authentication method
    pub credential: Credential,
    /// Expected host key fingerprint, if pinned
    pub host_key: Option<String>,
    /// Files to follow, each tailed independently
    pub file_paths: Vec<String>,
}

impl ServerTarget {
    /// Address used for the connection and for tagging messages
    pub fn address(&self) -> String {
        if self.hostname.contains(':') {
            self.hostname.clone()
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }
}
