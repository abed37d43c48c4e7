//! Sink trait

use async_trait::async_trait;

use crate::error::SinkError;
use crate::types::Message;

/// External destination that receives every aggregated line
#[async_trait]
pub trait Sink: Send + Sync {
    /// Forward one message
    async fn publish(&self, message: &Message) -> Result<(), SinkError>;

    /// Flush and release resources; calling it twice is harmless
    async fn close(&self) -> Result<(), SinkError>;
}
