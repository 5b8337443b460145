//! Buz - Manifold
//!
//! The concurrent pipeline joining protocol adapters to sinks.
//!
//! # Architecture
//!
//! ```text
//! [Adapters]                  [Manifold]                      [Sinks]
//!   pixel ────┐                                            ┌──→ file (valid)
//!   webhook ──┼──→ ingress ──→ annotator workers ──→ lanes ┼──→ file (invalid)
//!   snowplow ─┘    (MPMC)       resolve + validate   (mpsc)└──→ http
//! ```
//!
//! # Key Design
//!
//! - **Bounded everywhere**: the ingress queue and every per-sink lane are
//!   bounded channels, so producer bursts translate into `Overloaded`
//!   responses instead of unbounded memory.
//! - **Annotation before dispatch**: workers resolve the schema through the
//!   shared cache, validate the payload, and stamp the verdict; only
//!   resolved envelopes reach sinks.
//! - **Class routing**: each sink lane accepts `valid`, `invalid`, or `all`
//!   envelopes; an envelope is delivered to each matching sink at most once.
//! - **Per-sink publisher loops**: each sink drains its own lane,
//!   accumulating batches by size or age, with exponential-backoff retries.
//! - **Phased shutdown**: close ingress, drain workers, close lanes, drain
//!   publishers with a final flush, close sinks. Every phase is bounded.
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(SchemaCache::build(&config.registry, config.manifold.fetch_timeout)?);
//! let sinks = build_sinks(&config.sinks)?;
//! let manifold = Manifold::initialize(registry, sinks, config.manifold, meta).await?;
//!
//! manifold.enqueue(envelope)?;       // called by adapters
//! let stats = manifold.stats();      // ops endpoint
//! manifold.shutdown().await?;        // drains and closes everything
//! ```

mod annotate;
mod error;
mod lane;
mod manifold;
mod publisher;
mod stats;

pub use annotate::annotate;
pub use error::{EnqueueError, ManifoldError, ShutdownError, ShutdownPhase};
pub use manifold::{Manifold, RouteOverview, SinkRoute};
pub use stats::{IngressSnapshot, ManifoldStats, SinkStatsSnapshot};
