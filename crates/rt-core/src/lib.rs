//! rt-core: Core abstractions and configuration for remote-tail
//!
//! This crate provides the shared message type, the error taxonomy, the
//! configuration model and the traits implemented by the SSH transport and
//! the sink drivers.

pub mod config;
pub mod console;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{ConfigError, SinkError, TailError};
pub use types::{Message, ServerTarget, StreamKind};
