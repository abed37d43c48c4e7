//! rt-ssh: SSH transport for remote-tail
//!
//! Implements the [`rt_core::traits::Connector`] family over `russh`: one
//! authenticated connection per host, a PTY-backed exec channel per tailed
//! file, and in-memory pipes that split channel data into stdout and stderr.

mod connector;
mod shell;

pub use connector::{SshConnector, SshSession};
pub use shell::SshShell;
