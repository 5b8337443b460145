//! Sink lanes
//!
//! A lane is the bounded channel between the annotator workers and one
//! sink's publisher loop, plus the routing metadata and counters the
//! workers consult on the hot path.

use std::sync::Arc;

use buz_envelope::{AcceptedClass, Envelope};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::stats::{DropTracker, SinkStats};

/// Channel and routing state for one sink
pub(crate) struct SinkLane {
    /// Configured sink name (for logs)
    pub name: String,

    /// Which envelope classes this sink accepts
    pub accepted: AcceptedClass,

    /// Whether the worker must block instead of dropping on overflow
    pub delivery_required: bool,

    /// Sender half; taken (set to None) at shutdown to close the lane
    sender: Mutex<Option<mpsc::Sender<Envelope>>>,

    /// Pipeline counters for this sink
    pub stats: Arc<SinkStats>,

    /// Rate-limited overflow logging
    drops: DropTracker,
}

impl SinkLane {
    pub fn new(
        name: impl Into<String>,
        accepted: AcceptedClass,
        delivery_required: bool,
        sender: mpsc::Sender<Envelope>,
    ) -> Self {
        Self {
            name: name.into(),
            accepted,
            delivery_required,
            sender: Mutex::new(Some(sender)),
            stats: Arc::new(SinkStats::default()),
            drops: DropTracker::new(),
        }
    }

    /// Offer an annotated envelope to this lane
    ///
    /// Delivery-required lanes wait for capacity; others drop on overflow
    /// and count it. A closed lane (publisher gone) counts as an error.
    pub async fn offer(&self, envelope: Envelope) {
        let Some(sender) = self.sender.lock().clone() else {
            // Lane already closed by shutdown
            self.stats.record_error();
            return;
        };

        if self.delivery_required {
            match sender.send(envelope).await {
                Ok(()) => self.stats.record_enqueued(),
                Err(_) => self.stats.record_error(),
            }
        } else {
            match sender.try_send(envelope) {
                Ok(()) => self.stats.record_enqueued(),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.stats.record_dropped(1);
                    self.drops.record_drop(&self.name, 1);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.stats.record_error();
                }
            }
        }
    }

    /// Drop the sender half so the publisher loop sees end-of-stream
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Whether the lane has been closed
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl std::fmt::Debug for SinkLane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkLane")
            .field("name", &self.name)
            .field("accepted", &self.accepted)
            .field("delivery_required", &self.delivery_required)
            .field("closed", &self.sender.lock().is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buz_envelope::Protocol;
    use serde_json::Map;

    fn envelope() -> Envelope {
        Envelope::new(Protocol::Pixel, "pixel", "k", "pixel", Map::new())
    }

    #[tokio::test]
    async fn test_offer_enqueues() {
        let (tx, mut rx) = mpsc::channel(4);
        let lane = SinkLane::new("s", AcceptedClass::All, false, tx);

        lane.offer(envelope()).await;
        assert!(rx.recv().await.is_some());
        assert_eq!(lane.stats.snapshot().enqueued, 1);
    }

    #[tokio::test]
    async fn test_overflow_drops_when_not_required() {
        let (tx, _rx) = mpsc::channel(1);
        let lane = SinkLane::new("s", AcceptedClass::All, false, tx);

        lane.offer(envelope()).await;
        lane.offer(envelope()).await;

        let s = lane.stats.snapshot();
        assert_eq!(s.enqueued, 1);
        assert_eq!(s.dropped, 1);
    }

    #[tokio::test]
    async fn test_closed_lane_counts_error() {
        let (tx, _rx) = mpsc::channel(1);
        let lane = SinkLane::new("s", AcceptedClass::All, false, tx);
        lane.close();
        assert!(lane.is_closed());

        lane.offer(envelope()).await;
        assert_eq!(lane.stats.snapshot().errors, 1);
    }
}
