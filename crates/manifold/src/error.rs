//! Manifold error types

use thiserror::Error;

/// Errors from manifold construction
///
/// All fatal: a collector that cannot build its pipeline cannot start.
#[derive(Debug, Error)]
pub enum ManifoldError {
    /// A sink failed to initialize
    #[error("sink '{name}' failed to initialize: {source}")]
    SinkInit {
        /// Configured sink name
        name: String,
        /// Underlying sink error
        #[source]
        source: buz_sinks::SinkError,
    },

    /// No sinks were supplied
    #[error("manifold requires at least one sink")]
    NoSinks,
}

/// Outcome of offering an envelope to the ingress queue
///
/// Adapters translate these to HTTP status codes: `Overloaded` to 429,
/// `ShuttingDown` to 503.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// Ingress queue is full
    #[error("ingress queue full")]
    Overloaded,

    /// The manifold is shutting down and rejects new work
    #[error("collector is shutting down")]
    ShuttingDown,
}

/// Shutdown phases that can exceed their drain bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Annotator workers draining the ingress queue
    DrainIngress,

    /// Publisher loops draining sink lanes and flushing
    DrainSinks,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DrainIngress => f.write_str("drain_ingress"),
            Self::DrainSinks => f.write_str("drain_sinks"),
        }
    }
}

/// Shutdown completed but a phase exceeded its bound
///
/// Later phases still ran; `pending` estimates the envelopes abandoned in
/// the timed-out stage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShutdownError {
    /// A drain phase exceeded its deadline
    #[error("shutdown phase {phase} timed out with ~{pending} envelopes pending")]
    Timeout {
        /// Which phase overran
        phase: ShutdownPhase,
        /// Estimated envelopes left behind
        pending: u64,
    },
}
