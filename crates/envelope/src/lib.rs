//! Buz - Envelope
//!
//! The neutral internal representation of one event, shared by every other
//! crate in the collector.
//!
//! # Lifecycle
//!
//! ```text
//! [Adapter] --decode--> Envelope (validity: unknown)
//!     --> [Annotator] stamps verdict + collector metadata
//!     --> [Sinks] read, never mutate
//! ```
//!
//! Adapters construct envelopes with [`Envelope::new`], which stamps the
//! event uuid and ingestion timestamp. The annotator resolves the schema,
//! validates the payload, and flips `pipeline.validity` from `Unknown` to
//! `Valid` or `Invalid`. Sinks receive envelopes as shared references and
//! serialize them however they like (the built-ins all use JSON).

mod envelope;
mod meta;
mod protocol;
mod validity;

pub use envelope::{Envelope, EventMeta, PipelineMeta, ValidationFailure};
pub use meta::CollectorMeta;
pub use protocol::Protocol;
pub use validity::{AcceptedClass, Validity};
