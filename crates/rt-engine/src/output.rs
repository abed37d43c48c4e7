//! Operator-facing output
//!
//! Aggregated lines go to stdout tagged with host and path; task failures
//! go to the same stream in red so they interleave with the log lines they
//! interrupt.

use std::io::Write;

use rt_core::console::{paint, Tint};
use rt_core::Message;

/// Where rendered lines and task failures are shown
pub trait OperatorOutput: Send + Sync {
    /// Render one aggregated line
    fn message(&self, message: &Message);

    /// Report a task failure
    fn error(&self, text: &str);

    /// Informational line (banner, summaries)
    fn notice(&self, text: &str);
}

/// Writes to the process's standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn new() -> Self {
        Self
    }
}

/// `<host> <path> -> <content>`, always ending with a newline
pub fn format_message(message: &Message) -> String {
    let mut line = format!(
        "{} {} {} {}",
        paint(Tint::Green, message.host()),
        paint(Tint::Green, message.path()),
        paint(Tint::Yellow, "->"),
        message.content()
    );
    if !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

/// Red `Error: ...` line
pub fn format_error(text: &str) -> String {
    format!("{}\n", paint(Tint::Red, &format!("Error: {}", text)))
}

impl OperatorOutput for ConsoleOutput {
    fn message(&self, message: &Message) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(format_message(message).as_bytes());
        let _ = stdout.flush();
    }

    fn error(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(format_error(text).as_bytes());
        let _ = stdout.flush();
    }

    fn notice(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", text);
    }
}
