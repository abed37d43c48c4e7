//! Newline-delimited JSON file sink

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use rt_core::config::SinkSettings;
use rt_core::traits::Sink;
use rt_core::{Message, SinkError};

use crate::record::SinkRecord;

/// Appends one JSON record per line to a local file
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonlSink {
    /// Registry name of this driver
    pub const DRIVER: &'static str = "jsonl";

    /// Open (or create) the file named by the configured topic
    pub fn open(settings: &SinkSettings) -> Result<Self, SinkError> {
        if settings.topic.is_empty() {
            return Err(SinkError::Config("no output file configured".to_string()));
        }
        Self::open_path(Path::new(&settings.topic))
    }

    /// Open (or create) `path` for appending
    pub fn open_path(path: &Path) -> Result<Self, SinkError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(Some(BufWriter::new(File::from_std(file)))),
        })
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for JsonlSink {
    async fn publish(&self, message: &Message) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&SinkRecord::from(message))?;
        line.push(b'\n');

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SinkError::Closed)?;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}
