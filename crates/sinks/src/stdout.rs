//! Stdout sink - NDJSON debug output
//!
//! Writes one JSON line per envelope to stdout. Not intended for
//! production throughput; useful when bringing up a new deployment.

use async_trait::async_trait;
use buz_config::StdoutSinkConfig;
use buz_envelope::Envelope;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{encode_ndjson, MetricsSnapshot, Sink, SinkDescriptor, SinkError, SinkMetrics};

/// Sink that prints NDJSON lines to stdout
pub struct StdoutSink {
    descriptor: SinkDescriptor,
    metrics: SinkMetrics,

    // Serializes concurrent batch_publish calls so lines never interleave
    stdout: Mutex<tokio::io::Stdout>,
}

impl StdoutSink {
    /// Create a stdout sink
    pub fn new(name: impl Into<String>, config: &StdoutSinkConfig) -> Self {
        Self {
            descriptor: SinkDescriptor::new(name, "stdout", config.delivery_required, config.accept),
            metrics: SinkMetrics::new(),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn initialize(&self) -> Result<(), SinkError> {
        tracing::info!(sink = %self.descriptor.name, "stdout sink ready");
        Ok(())
    }

    async fn batch_publish(&self, envelopes: &[Envelope]) -> Result<usize, SinkError> {
        let bytes = encode_ndjson(envelopes)?;

        let mut stdout = self.stdout.lock().await;
        if let Err(e) = stdout.write_all(&bytes).await {
            self.metrics.write_error();
            return Err(SinkError::Io(e));
        }

        self.metrics
            .batch_written(envelopes.len() as u64, bytes.len() as u64);
        Ok(envelopes.len())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut stdout = self.stdout.lock().await;
        stdout.flush().await.map_err(SinkError::Io)?;
        self.metrics.flush();
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.flush().await?;
        let s = self.metrics.snapshot();
        tracing::info!(
            sink = %self.descriptor.name,
            envelopes = s.envelopes_written,
            bytes = s.bytes_written,
            "stdout sink closed"
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
