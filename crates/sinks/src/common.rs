//! Common types shared by all sinks
//!
//! Errors, descriptors, and the atomic metrics every sink type carries.

use std::sync::atomic::{AtomicU64, Ordering};

use buz_envelope::AcceptedClass;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Identity and routing metadata for one sink instance
///
/// Created when the sink is built, read by the manifold for routing and by
/// the route-overview ops endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SinkDescriptor {
    /// Unique instance id
    pub id: Uuid,

    /// Configured sink name
    pub name: String,

    /// Sink type ("stdout", "file", ...)
    pub kind: &'static str,

    /// Whether overflow drops are forbidden
    pub delivery_required: bool,

    /// Which envelope classes this sink accepts
    pub accepted: AcceptedClass,
}

impl SinkDescriptor {
    /// Build a descriptor with a fresh instance id
    pub fn new(
        name: impl Into<String>,
        kind: &'static str,
        delivery_required: bool,
        accepted: AcceptedClass,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            delivery_required,
            accepted,
        }
    }
}

/// Metrics shared by all sink types
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total batches accepted by batch_publish
    batches_written: AtomicU64,

    /// Total envelopes written
    envelopes_written: AtomicU64,

    /// Total bytes written
    bytes_written: AtomicU64,

    /// Write errors encountered
    write_errors: AtomicU64,

    /// Flush operations performed
    flush_count: AtomicU64,
}

impl SinkMetrics {
    /// Create a new metrics instance
    pub const fn new() -> Self {
        Self {
            batches_written: AtomicU64::new(0),
            envelopes_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        }
    }

    /// Record a successfully written batch
    #[inline]
    pub fn batch_written(&self, envelope_count: u64, bytes: u64) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.envelopes_written
            .fetch_add(envelope_count, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a write error
    #[inline]
    pub fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flush operation
    #[inline]
    pub fn flush(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_written: self.batches_written.load(Ordering::Relaxed),
            envelopes_written: self.envelopes_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub batches_written: u64,
    pub envelopes_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
    pub flush_count: u64,
}

/// Common sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink initialization failed
    #[error("failed to initialize sink: {0}")]
    Init(String),

    /// Failed to write data
    #[error("write failed: {0}")]
    Write(String),

    /// A batch was partially delivered before the failure
    ///
    /// The manifold does not retry partial batches: redelivering the whole
    /// batch would break at-most-once semantics for the envelopes that
    /// already landed.
    #[error("partial delivery ({delivered} written): {cause}")]
    Partial {
        /// Envelopes delivered before the failure
        delivered: usize,
        /// What went wrong
        cause: String,
    },

    /// Failed to flush data
    #[error("flush failed: {0}")]
    Flush(String),

    /// Publish exceeded its deadline
    #[error("publish timed out")]
    PublishTimeout,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SinkError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create a write error
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
