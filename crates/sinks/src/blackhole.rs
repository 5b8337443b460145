//! Blackhole sink - counts and discards
//!
//! Used for benchmarking the pipeline without sink I/O, and as the
//! observable endpoint in tests: metrics record exactly what reached the
//! sink.

use async_trait::async_trait;
use buz_config::BlackholeSinkConfig;
use buz_envelope::Envelope;

use crate::{MetricsSnapshot, Sink, SinkDescriptor, SinkError, SinkMetrics};

/// Sink that discards every envelope after counting it
pub struct BlackholeSink {
    descriptor: SinkDescriptor,
    metrics: SinkMetrics,
}

impl BlackholeSink {
    /// Create a blackhole sink
    pub fn new(name: impl Into<String>, config: &BlackholeSinkConfig) -> Self {
        Self {
            descriptor: SinkDescriptor::new(
                name,
                "blackhole",
                config.delivery_required,
                config.accept,
            ),
            metrics: SinkMetrics::new(),
        }
    }
}

#[async_trait]
impl Sink for BlackholeSink {
    async fn initialize(&self) -> Result<(), SinkError> {
        tracing::info!(sink = %self.descriptor.name, "blackhole sink ready");
        Ok(())
    }

    async fn batch_publish(&self, envelopes: &[Envelope]) -> Result<usize, SinkError> {
        self.metrics.batch_written(envelopes.len() as u64, 0);
        Ok(envelopes.len())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.metrics.flush();
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let s = self.metrics.snapshot();
        tracing::info!(
            sink = %self.descriptor.name,
            envelopes = s.envelopes_written,
            "blackhole sink closed"
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

    fn envelope() -> Envelope {
        Envelope::new(Protocol::Webhook, "webhook", "k", "webhook", Map::new())
    }

    #[tokio::test]
    async fn test_counts_and_discards() {
        let sink = BlackholeSink::new("hole", &BlackholeSinkConfig::default());
        sink.initialize().await.unwrap();

        let delivered = sink
            .batch_publish(&[envelope(), envelope(), envelope()])
            .await
            .unwrap();
        assert_eq!(delivered, 3);

        sink.flush().await.unwrap();
        sink.close().await.unwrap();

        let s = sink.metrics();
        assert_eq!(s.batches_written, 1);
        assert_eq!(s.envelopes_written, 3);
        assert_eq!(s.flush_count, 1);
    }
}
