//! Core trait definitions

mod remote;
mod sink;

pub use remote::{Connector, OutputPipe, PtyRequest, RemoteSession, RemoteShell, TerminalMode};
pub use sink::Sink;
