//! Buz - Sinks
//!
//! Downstream destinations for annotated envelopes.
//!
//! # Architecture
//!
//! Each sink implements the [`Sink`] capability set
//! (`initialize` / `batch_publish` / `flush` / `close` plus metadata
//! readers) and is driven by its own publisher loop in the manifold. Sinks
//! are byte-level writers from the pipeline's perspective: they choose
//! their own batching and format. The built-ins all emit newline-delimited
//! JSON.
//!
//! ```text
//! [Manifold publisher loop] --&[Envelope]--> [Sink] --> [Destination]
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Purpose |
//! |------|---------|
//! | `stdout` | Debug output |
//! | `file` | Buffered NDJSON appender |
//! | `http` | Forward to a remote collector |
//! | `blackhole` | Discard (benchmarks, tests) |
//!
//! A sink declares which envelope classes it accepts (`valid`, `invalid`,
//! `all`); the manifold routes each envelope only to matching sinks.

mod blackhole;
mod common;
mod file;
mod http;
mod ndjson;
mod sink;
mod stdout;

pub use blackhole::BlackholeSink;
pub use common::{MetricsSnapshot, SinkDescriptor, SinkError, SinkMetrics};
pub use file::FileSink;
pub use http::HttpSink;
pub use ndjson::encode_ndjson;
pub use sink::{build_sinks, Sink};
pub use stdout::StdoutSink;
