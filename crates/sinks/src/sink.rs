//! The sink capability set and factory
//!
//! The manifold drives sinks exclusively through this trait; concrete types
//! are chosen once, from the tagged config variant, at startup.

use std::sync::Arc;

use async_trait::async_trait;
use buz_config::{SinkConfig, SinksConfig};
use buz_envelope::{AcceptedClass, Envelope};
use uuid::Uuid;

use crate::{BlackholeSink, FileSink, HttpSink, MetricsSnapshot, SinkDescriptor, SinkError, StdoutSink};

/// A downstream destination for annotated envelopes
///
/// Implementations must be internally thread-safe: `batch_publish` may be
/// invoked concurrently, and the manifold holds sinks behind `Arc`.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Open connections, create paths, verify the destination exists
    ///
    /// Called exactly once by the manifold before any publish. A failure
    /// here is fatal to startup.
    async fn initialize(&self) -> Result<(), SinkError>;

    /// Accept a batch of envelopes; returns the delivered count
    ///
    /// Implementations may buffer or write synchronously. On partial
    /// delivery, return `SinkError::Partial` with the delivered count.
    async fn batch_publish(&self, envelopes: &[Envelope]) -> Result<usize, SinkError>;

    /// Force any buffered bytes downstream
    async fn flush(&self) -> Result<(), SinkError>;

    /// Flush, then release resources
    ///
    /// Called exactly once during shutdown; no publish or flush follows.
    async fn close(&self) -> Result<(), SinkError>;

    /// Identity and routing metadata
    fn descriptor(&self) -> &SinkDescriptor;

    /// Counter snapshot
    fn metrics(&self) -> MetricsSnapshot;

    /// Unique instance id
    fn id(&self) -> Uuid {
        self.descriptor().id
    }

    /// Configured sink name
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Whether overflow drops are forbidden
    fn delivery_required(&self) -> bool {
        self.descriptor().delivery_required
    }

    /// Which envelope classes this sink accepts
    fn accepted(&self) -> AcceptedClass {
        self.descriptor().accepted
    }
}

/// Build every configured sink instance
///
/// Each config entry yields exactly one sink. Sinks are returned in name
/// order and are not yet initialized; the manifold initializes them during
/// its own startup.
pub fn build_sinks(config: &SinksConfig) -> Result<Vec<Arc<dyn Sink>>, SinkError> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::with_capacity(config.len());

    for (name, sink_config) in config.iter() {
        let sink: Arc<dyn Sink> = match sink_config {
            SinkConfig::Stdout(c) => Arc::new(StdoutSink::new(name, c)),
            SinkConfig::File(c) => Arc::new(FileSink::new(name, c)),
            SinkConfig::Http(c) => Arc::new(HttpSink::new(name, c)?),
            SinkConfig::Blackhole(c) => Arc::new(BlackholeSink::new(name, c)),
        };
        tracing::debug!(
            sink = %sink.name(),
            kind = sink.descriptor().kind,
            accepted = ?sink.accepted(),
            delivery_required = sink.delivery_required(),
            "built sink"
        );
        sinks.push(sink);
    }

    Ok(sinks)
}
