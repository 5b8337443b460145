//! Sink publisher loops
//!
//! One loop per sink: drain the lane, accumulate a batch up to the size
//! cap or age cap (whichever first), publish with retries, and flush on
//! the way out.

use std::sync::Arc;
use std::time::Duration;

use buz_envelope::Envelope;
use buz_sinks::{Sink, SinkError};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};

use crate::stats::SinkStats;

/// First retry delay; doubles per attempt
const RETRY_BASE: Duration = Duration::from_millis(100);

/// Backoff ceiling
const RETRY_CAP: Duration = Duration::from_secs(30);

/// Batching and retry parameters, carved out of the manifold config
#[derive(Debug, Clone)]
pub(crate) struct PublisherConfig {
    pub batch_size: usize,
    pub batch_age: Duration,
    pub publish_timeout: Duration,
    pub max_attempts: usize,
}

/// One sink's publisher loop state
pub(crate) struct Publisher {
    sink: Arc<dyn Sink>,
    stats: Arc<SinkStats>,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(sink: Arc<dyn Sink>, stats: Arc<SinkStats>, config: PublisherConfig) -> Self {
        Self {
            sink,
            stats,
            config,
        }
    }

    /// Drain the lane until it closes, then publish the tail and flush
    pub async fn run(self, mut receiver: mpsc::Receiver<Envelope>) {
        let name = self.sink.name().to_string();
        tracing::debug!(
            sink = %name,
            batch_size = self.config.batch_size,
            batch_age = ?self.config.batch_age,
            "publisher starting"
        );

        let mut batch: Vec<Envelope> = Vec::with_capacity(self.config.batch_size);
        let mut deadline = Instant::now();

        loop {
            if batch.is_empty() {
                // Nothing pending: wait for the next envelope with no timer
                match receiver.recv().await {
                    Some(envelope) => {
                        deadline = Instant::now() + self.config.batch_age;
                        batch.push(envelope);
                    }
                    None => break,
                }
            } else {
                // Batch open: wait until it fills or ages out
                match timeout_at(deadline, receiver.recv()).await {
                    Ok(Some(envelope)) => batch.push(envelope),
                    Ok(None) => {
                        self.publish(&mut batch).await;
                        break;
                    }
                    Err(_) => self.publish(&mut batch).await,
                }
            }

            if batch.len() >= self.config.batch_size {
                self.publish(&mut batch).await;
            }
        }

        // Lane closed and drained: one final flush
        self.publish(&mut batch).await;
        if let Err(e) = self.sink.flush().await {
            self.stats.record_error();
            tracing::warn!(sink = %name, error = %e, "final flush failed");
        }

        tracing::debug!(sink = %name, "publisher stopping");
    }

    /// Publish a batch under the retry policy
    ///
    /// Delivery-required sinks retry until the batch lands. Others give up
    /// after `max_attempts` and count the batch as dropped. A partial
    /// result is terminal either way: retrying envelopes that already
    /// landed would break at-most-once delivery.
    async fn publish(&self, batch: &mut Vec<Envelope>) {
        if batch.is_empty() {
            return;
        }
        let envelopes = std::mem::take(batch);
        let delivery_required = self.sink.delivery_required();

        let mut attempt = 0usize;
        let mut backoff = RETRY_BASE;

        loop {
            attempt += 1;

            let outcome = match timeout(
                self.config.publish_timeout,
                self.sink.batch_publish(&envelopes),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SinkError::PublishTimeout),
            };

            let error = match outcome {
                Ok(delivered) => {
                    self.stats.record_published(delivered as u64);
                    return;
                }
                Err(SinkError::Partial { delivered, cause }) => {
                    self.stats.record_published(delivered as u64);
                    self.stats.record_error();
                    self.stats
                        .record_dropped((envelopes.len() - delivered) as u64);
                    tracing::warn!(
                        sink = %self.sink.name(),
                        delivered,
                        total = envelopes.len(),
                        cause,
                        "partial publish; remainder dropped"
                    );
                    return;
                }
                Err(e) => e,
            };

            self.stats.record_error();

            if !delivery_required && attempt >= self.config.max_attempts {
                self.stats.record_dropped(envelopes.len() as u64);
                tracing::warn!(
                    sink = %self.sink.name(),
                    attempts = attempt,
                    envelopes = envelopes.len(),
                    error = %error,
                    "publish abandoned after max attempts"
                );
                return;
            }

            self.stats.record_retry();
            let delay = jitter(backoff);
            tracing::debug!(
                sink = %self.sink.name(),
                attempt,
                delay = ?delay,
                error = %error,
                "publish failed; retrying"
            );
            tokio::time::sleep(delay).await;
            backoff = (backoff * 2).min(RETRY_CAP);
        }
    }
}

/// Add up to 50% uniform jitter so retry storms decorrelate
fn jitter(base: Duration) -> Duration {
    let extra = rand::rng().random_range(0..=base.as_millis() as u64 / 2);
    base + Duration::from_millis(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(100);
        for _ in 0..100 {
            let d = jitter(base);
            assert!(d >= base);
            assert!(d <= base + Duration::from_millis(50));
        }
    }

    #[test]
    fn test_backoff_doubling_caps() {
        let mut backoff = RETRY_BASE;
        for _ in 0..20 {
            backoff = (backoff * 2).min(RETRY_CAP);
        }
        assert_eq!(backoff, RETRY_CAP);
    }
}
