//! remote-tail: follow log files on many hosts at once
//!
//! Helpers behind the `remote-tail` binary that are worth testing on their
//! own: the startup banner and the mapping from verbosity to a log filter.

pub mod banner;
pub mod logging;
