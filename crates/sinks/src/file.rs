//! File sink - buffered NDJSON appender
//!
//! Appends one JSON line per envelope to a single file through a buffered
//! writer. `initialize` creates the parent directory and opens the file in
//! append mode; `flush` pushes buffered bytes to the OS; `close` flushes
//! and drops the writer.

use std::path::PathBuf;

use async_trait::async_trait;
use buz_config::FileSinkConfig;
use buz_envelope::Envelope;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use crate::{encode_ndjson, MetricsSnapshot, Sink, SinkDescriptor, SinkError, SinkMetrics};

/// Sink that appends NDJSON to a file
pub struct FileSink {
    descriptor: SinkDescriptor,
    metrics: SinkMetrics,
    path: PathBuf,
    buffer_size: usize,

    // None until initialize; None again after close
    writer: Mutex<Option<BufWriter<tokio::fs::File>>>,
}

impl FileSink {
    /// Create a file sink (the file is opened by `initialize`)
    pub fn new(name: impl Into<String>, config: &FileSinkConfig) -> Self {
        Self {
            descriptor: SinkDescriptor::new(name, "file", config.delivery_required, config.accept),
            metrics: SinkMetrics::new(),
            path: PathBuf::from(&config.path),
            buffer_size: config.buffer_size,
            writer: Mutex::new(None),
        }
    }

    /// Destination path
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn initialize(&self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SinkError::init(format!("create {}: {e}", parent.display())))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SinkError::init(format!("open {}: {e}", self.path.display())))?;

        *self.writer.lock().await = Some(BufWriter::with_capacity(self.buffer_size, file));

        tracing::info!(
            sink = %self.descriptor.name,
            path = %self.path.display(),
            "file sink ready"
        );
        Ok(())
    }

    async fn batch_publish(&self, envelopes: &[Envelope]) -> Result<usize, SinkError> {
        let bytes = encode_ndjson(envelopes)?;

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| SinkError::write("file sink not initialized"))?;

        if let Err(e) = writer.write_all(&bytes).await {
            self.metrics.write_error();
            return Err(SinkError::Io(e));
        }

        self.metrics
            .batch_written(envelopes.len() as u64, bytes.len() as u64);
        Ok(envelopes.len())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut guard = self.writer.lock().await;
        if let Some(writer) = guard.as_mut() {
            writer.flush().await.map_err(SinkError::Io)?;
            self.metrics.flush();
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            writer.flush().await.map_err(SinkError::Io)?;
            self.metrics.flush();
        }

        let s = self.metrics.snapshot();
        tracing::info!(
            sink = %self.descriptor.name,
            path = %self.path.display(),
            envelopes = s.envelopes_written,
            bytes = s.bytes_written,
            "file sink closed"
        );
        Ok(())
    }

    fn descriptor(&self) -> &SinkDescriptor {
        &self.descriptor
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buz_envelope::Protocol;
    use serde_json::Map;

    fn config(path: &std::path::Path) -> FileSinkConfig {
        FileSinkConfig {
            path: path.to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    fn envelope(event_type: &str) -> Envelope {
        Envelope::new(Protocol::Webhook, "webhook", "k", event_type, Map::new())
    }

    #[tokio::test]
    async fn test_write_flush_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        let sink = FileSink::new("lake", &config(&path));

        sink.initialize().await.unwrap();
        sink.batch_publish(&[envelope("a"), envelope("b")]).await.unwrap();
        sink.flush().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("\"event_type\":\"a\""));

        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/events.ndjson");
        let sink = FileSink::new("lake", &config(&path));

        sink.initialize().await.unwrap();
        assert!(path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_publish_before_initialize_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new("lake", &config(&dir.path().join("x.ndjson")));

        let err = sink.batch_publish(&[envelope("a")]).await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn test_close_flushes_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        let sink = FileSink::new("lake", &config(&path));

        sink.initialize().await.unwrap();
        sink.batch_publish(&[envelope("tail")]).await.unwrap();
        // No explicit flush - close must push the buffered line out
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"event_type\":\"tail\""));
    }

    #[tokio::test]
    async fn test_append_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");

        for label in ["one", "two"] {
            let sink = FileSink::new("lake", &config(&path));
            sink.initialize().await.unwrap();
            sink.batch_publish(&[envelope(label)]).await.unwrap();
            sink.close().await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
