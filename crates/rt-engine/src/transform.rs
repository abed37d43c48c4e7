//! Per-stream line decoration

use rt_core::console::{paint, Tint};
use rt_core::StreamKind;

/// Prefix and color applied to every line of one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStyle {
    prefix: &'static str,
    tint: Option<Tint>,
}

impl LineStyle {
    /// Primary stream: lines pass through untouched
    pub fn primary() -> Self {
        Self {
            prefix: "",
            tint: None,
        }
    }

    /// Diagnostic stream: `Error:` prefix, red
    pub fn diagnostic() -> Self {
        Self {
            prefix: "Error:",
            tint: Some(Tint::Red),
        }
    }

    /// Style for `stream`
    pub fn for_stream(stream: StreamKind) -> Self {
        match stream {
            StreamKind::Primary => Self::primary(),
            StreamKind::Diagnostic => Self::diagnostic(),
        }
    }

    /// Decorate one line.
    ///
    /// The line terminator stays outside the color sequence so decorated
    /// lines still end with it.
    pub fn apply(&self, line: &str) -> String {
        let body = line.trim_end_matches(['\r', '\n']);
        let terminator = &line[body.len()..];

        let decorated = format!("{}{}", self.prefix, body);
        match self.tint {
            Some(tint) => format!("{}{}", paint(tint, &decorated), terminator),
            None => format!("{}{}", decorated, terminator),
        }
    }
}
