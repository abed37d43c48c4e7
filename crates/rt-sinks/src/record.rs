//! Wire record shared by the drivers

use serde::Serialize;

use rt_core::Message;

/// JSON shape of one published line
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SinkRecord<'a> {
    pub host: &'a str,
    pub path: &'a str,
    /// Line with its terminator stripped
    pub content: &'a str,
}

impl<'a> From<&'a Message> for SinkRecord<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            host: message.host(),
            path: message.path(),
            content: message.trimmed_content(),
        }
    }
}
