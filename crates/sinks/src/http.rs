//! HTTP sink - forward to a remote collector
//!
//! POSTs each batch as an NDJSON body to a configured URL. Publishing is
//! synchronous per batch: the batch is acknowledged only after the remote
//! returns a success status, which is what makes this sink usable with
//! `delivery_required = true`.

use std::time::Duration;

use async_trait::async_trait;
use buz_config::HttpSinkConfig;
use buz_envelope::Envelope;

use crate::{encode_ndjson, MetricsSnapshot, Sink, SinkDescriptor, SinkError, SinkMetrics};

/// Sink that forwards NDJSON batches over HTTP
pub struct HttpSink {
    descriptor: SinkDescriptor,
    metrics: SinkMetrics,
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    /// Create an HTTP sink
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Config` if the HTTP client cannot be built.
    pub fn new(name: impl Into<String>, config: &HttpSinkConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.write_timeout.max(Duration::from_millis(1)))
            .build()
            .map_err(|e| SinkError::config(e.to_string()))?;

        Ok(Self {
            descriptor: SinkDescriptor::new(name, "http", config.delivery_required, config.accept),
            metrics: SinkMetrics::new(),
            client,
            url: config.url.clone(),
        })
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn initialize(&self) -> Result<(), SinkError> {
        // Probe the target so a dead destination fails at startup rather
        // than on the first batch. Any HTTP status counts as reachable.
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                tracing::info!(
                    sink = %self.descriptor.name,
                    url = %self.url,
                    status = %response.status(),
                    "http sink ready"
                );
                Ok(())
            }
            Err(e) => Err(SinkError::init(format!("probe {}: {e}", self.url))),
        }
    }

    async fn batch_publish(&self, envelopes: &[Envelope]) -> Result<usize, SinkError> {
        let bytes = encode_ndjson(envelopes)?;
        let byte_count = bytes.len() as u64;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                self.metrics.write_error();
                if e.is_timeout() {
                    SinkError::PublishTimeout
                } else {
                    SinkError::write(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            self.metrics.write_error();
            return Err(SinkError::write(format!(
                "remote returned {}",
                response.status()
            )));
        }

        self.metrics
            .batch_written(envelopes.len() as u64, byte_count);
        Ok(envelopes.len())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        // Nothing buffered: every batch is written synchronously
        self.metrics.flush();
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let s = self.metrics.snapshot();
        tracing::info!(
            sink = %self.descriptor.name,
            url = %self.url,
            batches = s.batches_written,
            bytes = s.bytes_written,
            "http sink closed"
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

    #[test]
    fn test_build_from_config() {
        let config = HttpSinkConfig {
            url: "http://127.0.0.1:9/ingest".into(),
            ..Default::default()
        };
        let sink = HttpSink::new("upstream", &config).unwrap();
        assert_eq!(sink.name(), "upstream");
        assert_eq!(sink.url(), "http://127.0.0.1:9/ingest");
        assert_eq!(sink.descriptor().kind, "http");
    }

    #[tokio::test]
    async fn test_initialize_fails_on_unreachable_target() {
        // Port 9 (discard) is essentially never listening locally
        let config = HttpSinkConfig {
            url: "http://127.0.0.1:9/ingest".into(),
            write_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let sink = HttpSink::new("upstream", &config).unwrap();
        let err = sink.initialize().await.unwrap_err();
        assert!(matches!(err, SinkError::Init(_)));
    }
}
