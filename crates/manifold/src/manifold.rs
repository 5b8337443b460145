//! The manifold
//!
//! Owns the ingress queue, the annotator worker pool, and one lane +
//! publisher loop per sink. Entry point for protocol adapters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use buz_config::ManifoldConfig;
use buz_envelope::{AcceptedClass, CollectorMeta, Envelope};
use buz_registry::{RegistryError, SchemaCache};
use buz_sinks::Sink;
use crossfire::{MAsyncRx, MAsyncTx, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use uuid::Uuid;

use crate::annotate::annotate;
use crate::lane::SinkLane;
use crate::publisher::{Publisher, PublisherConfig};
use crate::stats::{IngressStats, ManifoldStats, SinkStatsSnapshot};
use crate::{EnqueueError, ManifoldError, ShutdownError, ShutdownPhase};

/// The channel pipeline joining adapters to sinks
///
/// Cheap to clone via the inner `Arc`; adapters hold a clone each.
#[derive(Clone)]
pub struct Manifold {
    shared: Arc<Shared>,
}

struct Shared {
    config: ManifoldConfig,
    meta: CollectorMeta,
    registry: Arc<SchemaCache>,
    sinks: Vec<Arc<dyn Sink>>,
    lanes: Arc<Vec<SinkLane>>,
    ingress: IngressStats,

    /// Sender half of ingress; taken at shutdown
    ingress_tx: Mutex<Option<MAsyncTx<Envelope>>>,

    /// Flipped first thing in shutdown; enqueue checks it before touching
    /// the channel
    shutting_down: AtomicBool,

    workers: Mutex<Vec<JoinHandle<()>>>,
    publishers: Mutex<Vec<JoinHandle<()>>>,
}

/// Routing summary for the ops route-overview endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RouteOverview {
    /// Active registry backend type
    pub registry_backend: &'static str,

    /// One entry per sink
    pub sinks: Vec<SinkRoute>,
}

/// One sink's routing entry
#[derive(Debug, Clone, Serialize)]
pub struct SinkRoute {
    pub id: Uuid,
    pub name: String,
    pub kind: &'static str,
    pub accepted: AcceptedClass,
    pub delivery_required: bool,
}

impl Manifold {
    /// Build queues, initialize sinks, and start workers
    ///
    /// Sink initialization failures are fatal; nothing is spawned unless
    /// every sink came up.
    pub async fn initialize(
        registry: Arc<SchemaCache>,
        sinks: Vec<Arc<dyn Sink>>,
        config: ManifoldConfig,
        meta: CollectorMeta,
    ) -> Result<Self, ManifoldError> {
        if sinks.is_empty() {
            return Err(ManifoldError::NoSinks);
        }

        for sink in &sinks {
            sink.initialize()
                .await
                .map_err(|source| ManifoldError::SinkInit {
                    name: sink.name().to_string(),
                    source,
                })?;
        }

        let (ingress_tx, ingress_rx) =
            crossfire::mpmc::bounded_async::<Envelope>(config.ingress_capacity);

        let publisher_config = PublisherConfig {
            batch_size: config.batch_size,
            batch_age: config.batch_age,
            publish_timeout: config.publish_timeout,
            max_attempts: config.max_attempts,
        };

        let mut lanes = Vec::with_capacity(sinks.len());
        let mut publishers = Vec::with_capacity(sinks.len());
        for sink in &sinks {
            let (lane_tx, lane_rx) = mpsc::channel(config.sink_queue_capacity);
            let lane = SinkLane::new(
                sink.name(),
                sink.accepted(),
                sink.delivery_required(),
                lane_tx,
            );
            let publisher = Publisher::new(
                Arc::clone(sink),
                Arc::clone(&lane.stats),
                publisher_config.clone(),
            );
            publishers.push(tokio::spawn(publisher.run(lane_rx)));
            lanes.push(lane);
        }

        let shared = Arc::new(Shared {
            meta,
            registry,
            lanes: Arc::new(lanes),
            sinks,
            ingress: IngressStats::default(),
            ingress_tx: Mutex::new(Some(ingress_tx)),
            shutting_down: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            publishers: Mutex::new(publishers),
            config,
        });

        let mut workers = Vec::with_capacity(shared.config.workers);
        for worker_id in 0..shared.config.workers {
            let receiver = ingress_rx.clone();
            let shared = Arc::clone(&shared);
            workers.push(tokio::spawn(worker_loop(worker_id, receiver, shared)));
        }
        *shared.workers.lock() = workers;

        tracing::info!(
            sinks = shared.sinks.len(),
            workers = shared.config.workers,
            ingress_capacity = shared.config.ingress_capacity,
            "manifold started"
        );

        Ok(Self { shared })
    }

    /// Offer an envelope onto the ingress queue
    ///
    /// Non-blocking by default; with `enqueue_wait` configured, waits up to
    /// that long for capacity before reporting `Overloaded`.
    pub async fn enqueue(&self, envelope: Envelope) -> Result<(), EnqueueError> {
        if self.shared.shutting_down.load(Ordering::Acquire) {
            self.shared.ingress.record_shutdown_reject();
            return Err(EnqueueError::ShuttingDown);
        }

        let Some(sender) = self.shared.ingress_tx.lock().clone() else {
            self.shared.ingress.record_shutdown_reject();
            return Err(EnqueueError::ShuttingDown);
        };

        let wait = self.shared.config.enqueue_wait;
        if wait.is_zero() {
            match sender.try_send(envelope) {
                Ok(()) => {
                    self.shared.ingress.record_accepted();
                    Ok(())
                }
                Err(TrySendError::Full(_)) => {
                    self.shared.ingress.record_overloaded();
                    Err(EnqueueError::Overloaded)
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.shared.ingress.record_shutdown_reject();
                    Err(EnqueueError::ShuttingDown)
                }
            }
        } else {
            match timeout(wait, sender.send(envelope)).await {
                Ok(Ok(())) => {
                    self.shared.ingress.record_accepted();
                    Ok(())
                }
                Ok(Err(_)) => {
                    self.shared.ingress.record_shutdown_reject();
                    Err(EnqueueError::ShuttingDown)
                }
                Err(_) => {
                    self.shared.ingress.record_overloaded();
                    Err(EnqueueError::Overloaded)
                }
            }
        }
    }

    /// Read-only registry handle for ops endpoints
    pub fn registry(&self) -> &Arc<SchemaCache> {
        &self.shared.registry
    }

    /// Purge the schema cache (ops endpoint)
    pub fn purge_cache(&self) {
        self.shared.registry.purge();
    }

    /// Fetch a raw schema document (ops endpoint)
    pub async fn schema(&self, key: &str) -> Result<Vec<u8>, RegistryError> {
        self.shared.registry.schema(key).await
    }

    /// Counter snapshot for the ops stats endpoint
    pub fn stats(&self) -> ManifoldStats {
        let sinks = self
            .shared
            .sinks
            .iter()
            .zip(self.shared.lanes.iter())
            .map(|(sink, lane)| {
                let raw = lane.stats.snapshot();
                SinkStatsSnapshot {
                    name: sink.name().to_string(),
                    kind: sink.descriptor().kind,
                    enqueued: raw.enqueued,
                    dropped: raw.dropped,
                    published: raw.published,
                    errors: raw.errors,
                    retries: raw.retries,
                    last_publish_ts: (raw.last_publish_ms > 0).then_some(raw.last_publish_ms),
                    sink: sink.metrics(),
                }
            })
            .collect();

        ManifoldStats {
            ingress: self.shared.ingress.snapshot(),
            sinks,
            cache: self.shared.registry.stats(),
        }
    }

    /// Routing summary for the ops route-overview endpoint
    pub fn route_overview(&self) -> RouteOverview {
        RouteOverview {
            registry_backend: self.shared.registry.backend_type(),
            sinks: self
                .shared
                .sinks
                .iter()
                .map(|sink| {
                    let d = sink.descriptor();
                    SinkRoute {
                        id: d.id,
                        name: d.name.clone(),
                        kind: d.kind,
                        accepted: d.accepted,
                        delivery_required: d.delivery_required,
                    }
                })
                .collect(),
        }
    }

    /// Drain and close the pipeline
    ///
    /// Phases, in strict order, each bounded:
    /// 1. reject new enqueues and drop the ingress sender;
    /// 2. wait for annotator workers to drain ingress;
    /// 3. close every sink lane;
    /// 4. wait for publisher loops (tail publish + final flush);
    /// 5. close every sink and the registry.
    ///
    /// A phase that overruns its bound is aborted and reported, but the
    /// remaining phases still run. After this returns, no sink method is
    /// ever invoked again. Idempotent: a second call is a no-op.
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        if self.shared.shutting_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::info!("manifold shutting down");
        self.shared.ingress_tx.lock().take();

        let mut first_overrun = None;

        let workers = std::mem::take(&mut *self.shared.workers.lock());
        if !join_all_within(workers, self.shared.config.drain_ingress_timeout).await {
            let pending = self.shared.ingress.pending();
            tracing::error!(pending, "ingress drain timed out; annotator workers aborted");
            first_overrun = Some(ShutdownError::Timeout {
                phase: ShutdownPhase::DrainIngress,
                pending,
            });
        }

        for lane in self.shared.lanes.iter() {
            lane.close();
        }

        let publishers = std::mem::take(&mut *self.shared.publishers.lock());
        if !join_all_within(publishers, self.shared.config.drain_sinks_timeout).await {
            let pending = self
                .shared
                .lanes
                .iter()
                .map(|lane| lane.stats.pending())
                .sum();
            tracing::error!(pending, "sink drain timed out; publisher loops aborted");
            if first_overrun.is_none() {
                first_overrun = Some(ShutdownError::Timeout {
                    phase: ShutdownPhase::DrainSinks,
                    pending,
                });
            }
        }

        for sink in &self.shared.sinks {
            if let Err(e) = sink.close().await {
                tracing::warn!(sink = %sink.name(), error = %e, "sink close failed");
            }
        }
        if let Err(e) = self.shared.registry.close().await {
            tracing::warn!(error = %e, "registry close failed");
        }

        let snapshot = self.shared.ingress.snapshot();
        tracing::info!(
            accepted = snapshot.accepted,
            processed = snapshot.processed,
            "manifold shut down"
        );

        match first_overrun {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Manifold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifold")
            .field("sinks", &self.shared.sinks.len())
            .field("workers", &self.shared.config.workers)
            .field(
                "shutting_down",
                &self.shared.shutting_down.load(Ordering::Relaxed),
            )
            .finish()
    }
}

/// Annotator worker: drain ingress, annotate, fan out to matching lanes
async fn worker_loop(worker_id: usize, receiver: MAsyncRx<Envelope>, shared: Arc<Shared>) {
    tracing::debug!(worker_id, "annotator worker starting");

    while let Ok(envelope) = receiver.recv().await {
        shared.ingress.record_processed();
        let annotated = annotate(envelope, &shared.registry, &shared.meta).await;

        for lane in shared.lanes.iter() {
            if lane.accepted.matches(annotated.validity()) {
                lane.offer(annotated.clone()).await;
            }
        }
    }

    tracing::debug!(worker_id, "annotator worker stopping");
}

/// Join every handle before the bound elapses; abort stragglers
///
/// Returns false if the deadline was hit. Aborted tasks stop at their next
/// await point, so nothing runs past this function for long.
async fn join_all_within(handles: Vec<JoinHandle<()>>, bound: Duration) -> bool {
    let deadline = Instant::now() + bound;
    let mut all_joined = true;

    for handle in handles {
        let abort = handle.abort_handle();
        if timeout_at(deadline, handle).await.is_err() {
            abort.abort();
            all_joined = false;
        }
    }

    all_joined
}
