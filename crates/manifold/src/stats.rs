//! Pipeline counters
//!
//! Atomic counters with relaxed ordering throughout; values are eventually
//! consistent, which is all the ops endpoints need.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use buz_registry::CacheStatsSnapshot;
use buz_sinks::MetricsSnapshot;

/// Ingress-side counters
#[derive(Debug, Default)]
pub(crate) struct IngressStats {
    /// Envelopes accepted onto the ingress queue
    accepted: AtomicU64,

    /// Enqueues rejected because the queue was full
    rejected_overloaded: AtomicU64,

    /// Enqueues rejected during shutdown
    rejected_shutdown: AtomicU64,

    /// Envelopes taken off the queue by annotator workers
    processed: AtomicU64,
}

impl IngressStats {
    #[inline]
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_overloaded(&self) {
        self.rejected_overloaded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_shutdown_reject(&self) {
        self.rejected_shutdown.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Envelopes accepted but not yet annotated
    pub fn pending(&self) -> u64 {
        self.accepted
            .load(Ordering::Relaxed)
            .saturating_sub(self.processed.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> IngressSnapshot {
        IngressSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_overloaded: self.rejected_overloaded.load(Ordering::Relaxed),
            rejected_shutdown: self.rejected_shutdown.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of ingress counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngressSnapshot {
    pub accepted: u64,
    pub rejected_overloaded: u64,
    pub rejected_shutdown: u64,
    pub processed: u64,
}

/// Per-sink pipeline counters
///
/// These count lane traffic as the manifold sees it; the sink's own
/// `SinkMetrics` count what actually hit the destination.
#[derive(Debug, Default)]
pub(crate) struct SinkStats {
    /// Envelopes enqueued onto this sink's lane
    enqueued: AtomicU64,

    /// Envelopes dropped (lane full, or batch abandoned after max attempts)
    dropped: AtomicU64,

    /// Envelopes acknowledged by batch_publish
    published: AtomicU64,

    /// Publish errors (including timeouts)
    errors: AtomicU64,

    /// Publish retries
    retries: AtomicU64,

    /// Epoch millis of the last successful publish (0 = never)
    last_publish_ms: AtomicU64,
}

impl SinkStats {
    #[inline]
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_published(&self, count: u64) {
        self.published.fetch_add(count, Ordering::Relaxed);
        self.last_publish_ms.store(now_ms(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Envelopes enqueued but neither published nor dropped
    pub fn pending(&self) -> u64 {
        let settled = self
            .published
            .load(Ordering::Relaxed)
            .saturating_add(self.dropped.load(Ordering::Relaxed));
        self.enqueued.load(Ordering::Relaxed).saturating_sub(settled)
    }

    pub fn snapshot(&self) -> RawSinkStats {
        RawSinkStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            last_publish_ms: self.last_publish_ms.load(Ordering::Relaxed),
        }
    }
}

/// Raw counter values for one sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RawSinkStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub published: u64,
    pub errors: u64,
    pub retries: u64,
    pub last_publish_ms: u64,
}

/// Per-sink stats as served by the ops endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SinkStatsSnapshot {
    /// Configured sink name
    pub name: String,

    /// Sink type
    pub kind: &'static str,

    /// Envelopes enqueued onto this sink's lane
    pub enqueued: u64,

    /// Envelopes dropped
    pub dropped: u64,

    /// Envelopes acknowledged by the sink
    pub published: u64,

    /// Publish errors
    pub errors: u64,

    /// Publish retries
    pub retries: u64,

    /// Epoch millis of the last successful publish
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_publish_ts: Option<u64>,

    /// The sink's own write metrics
    pub sink: MetricsSnapshot,
}

/// Full stats payload for the ops endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ManifoldStats {
    /// Ingress counters
    pub ingress: IngressSnapshot,

    /// One entry per sink
    pub sinks: Vec<SinkStatsSnapshot>,

    /// Schema cache counters
    pub cache: CacheStatsSnapshot,
}

/// Current epoch milliseconds
#[inline]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ============================================================================
// Drop tracker - rate-limited logging for overflow storms
// ============================================================================

/// Aggregates lane-overflow drops and logs a summary once per second
///
/// Per-event logging under sustained backpressure would melt the log
/// pipeline; operators still need to see that drops are happening.
///
/// Thresholds: any drops in the window log at WARN, more than 100 at ERROR.
#[derive(Debug)]
pub(crate) struct DropTracker {
    interval_drops: AtomicU64,
    last_log_ms: AtomicU64,
}

const LOG_INTERVAL_MS: u64 = 1000;
const CRITICAL_DROP_THRESHOLD: u64 = 100;

impl DropTracker {
    pub fn new() -> Self {
        Self {
            interval_drops: AtomicU64::new(0),
            last_log_ms: AtomicU64::new(now_ms()),
        }
    }

    /// Record dropped envelopes; logs at most once per interval
    pub fn record_drop(&self, sink: &str, count: u64) {
        self.interval_drops.fetch_add(count, Ordering::Relaxed);

        let now = now_ms();
        let last = self.last_log_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < LOG_INTERVAL_MS {
            return;
        }
        // Claim the log slot; losers just accumulate into the next window
        if self
            .last_log_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let drops = self.interval_drops.swap(0, Ordering::Relaxed);
        if drops == 0 {
            return;
        }

        if drops > CRITICAL_DROP_THRESHOLD {
            tracing::error!(
                sink,
                dropped = drops,
                "sink lane overflowing: envelopes dropped in last second"
            );
        } else {
            tracing::warn!(sink, dropped = drops, "sink lane full: envelopes dropped");
        }
    }

    #[cfg(test)]
    pub fn current_drops(&self) -> u64 {
        self.interval_drops.load(Ordering::Relaxed)
    }
}

impl Default for DropTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingress_pending() {
        let stats = IngressStats::default();
        stats.record_accepted();
        stats.record_accepted();
        stats.record_processed();
        assert_eq!(stats.pending(), 1);

        let s = stats.snapshot();
        assert_eq!(s.accepted, 2);
        assert_eq!(s.processed, 1);
    }

    #[test]
    fn test_sink_stats_pending() {
        let stats = SinkStats::default();
        for _ in 0..10 {
            stats.record_enqueued();
        }
        stats.record_published(6);
        stats.record_dropped(2);
        assert_eq!(stats.pending(), 2);
    }

    #[test]
    fn test_published_stamps_timestamp() {
        let stats = SinkStats::default();
        assert_eq!(stats.snapshot().last_publish_ms, 0);
        stats.record_published(1);
        assert!(stats.snapshot().last_publish_ms > 0);
    }

    #[test]
    fn test_drop_tracker_accumulates() {
        let tracker = DropTracker::new();
        tracker.record_drop("s", 3);
        tracker.record_drop("s", 2);
        // Within the first interval nothing is swapped out
        assert_eq!(tracker.current_drops(), 5);
    }

    #[test]
    fn test_concurrent_counting() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(SinkStats::default());
        let mut handles = vec![];
        for _ in 0..4 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    s.record_enqueued();
                    s.record_published(1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let s = stats.snapshot();
        assert_eq!(s.enqueued, 4000);
        assert_eq!(s.published, 4000);
    }
}
