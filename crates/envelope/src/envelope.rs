//! The envelope itself
//!
//! One envelope per event. Adapters fill `event_meta` and `payload`; the
//! annotator owns everything under `pipeline`; sinks read only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{CollectorMeta, Protocol, Validity};

/// Event-level metadata populated by the source adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMeta {
    /// Protocol the event arrived over
    pub protocol: Protocol,

    /// Opaque schema key; empty means the producer supplied none
    pub schema_key: String,

    /// Protocol-specific event type (e.g. "page_view", "webhook")
    pub event_type: String,

    /// Collector-assigned event id
    pub uuid: Uuid,

    /// Producer timestamp, when the protocol carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the collector received the event
    pub ingested_at: DateTime<Utc>,
}

/// First schema violation found during validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Human-readable description of the failure
    pub message: String,

    /// JSON pointer to the offending payload location, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ValidationFailure {
    /// Failure with no payload location (schema resolution errors)
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
        }
    }

    /// Failure anchored to a payload location
    pub fn at(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

/// Pipeline-level metadata owned by the annotator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMeta {
    /// Identifier of the adapter instance that produced the envelope
    pub source: String,

    /// Collector identity, stamped during annotation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector: Option<CollectorMeta>,

    /// When the annotator processed the envelope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,

    /// Validation verdict
    pub validity: Validity,

    /// First violation, set iff validity is Invalid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<ValidationFailure>,

    /// Free-form annotations (enrichment stages may append here)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub annotations: Map<String, Value>,
}

/// The collector's neutral representation of one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event_meta: EventMeta,
    pub pipeline: PipelineMeta,

    /// Decoded event body
    pub payload: Map<String, Value>,

    /// Producer-supplied context, never interpreted by the collector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,

    /// Ordered additional contexts (Snowplow semantics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<Value>>,
}

impl Envelope {
    /// Create an unannotated envelope, stamping uuid and ingestion time
    pub fn new(
        protocol: Protocol,
        source: impl Into<String>,
        schema_key: impl Into<String>,
        event_type: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            event_meta: EventMeta {
                protocol,
                schema_key: schema_key.into(),
                event_type: event_type.into(),
                uuid: Uuid::new_v4(),
                created_at: None,
                ingested_at: Utc::now(),
            },
            pipeline: PipelineMeta {
                source: source.into(),
                collector: None,
                processed_at: None,
                validity: Validity::Unknown,
                validation_error: None,
                annotations: Map::new(),
            },
            payload,
            context: None,
            contexts: None,
        }
    }

    /// Set the producer timestamp
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.event_meta.created_at = Some(at);
        self
    }

    /// Attach producer context
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    /// Attach ordered additional contexts
    #[must_use]
    pub fn with_contexts(mut self, contexts: Vec<Value>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    /// Current verdict
    #[inline]
    pub fn validity(&self) -> Validity {
        self.pipeline.validity
    }

    /// The opaque schema key
    #[inline]
    pub fn schema_key(&self) -> &str {
        &self.event_meta.schema_key
    }

    /// Mark the envelope valid
    pub fn mark_valid(&mut self) {
        self.pipeline.validity = Validity::Valid;
        self.pipeline.validation_error = None;
    }

    /// Mark the envelope invalid with the first observed failure
    pub fn mark_invalid(&mut self, failure: ValidationFailure) {
        self.pipeline.validity = Validity::Invalid;
        self.pipeline.validation_error = Some(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("url".into(), Value::String("/home".into()));
        m
    }

    #[test]
    fn test_new_envelope_is_unknown() {
        let e = Envelope::new(Protocol::Webhook, "webhook", "com.acme/click", "webhook", payload());
        assert_eq!(e.validity(), Validity::Unknown);
        assert!(e.pipeline.processed_at.is_none());
        assert!(e.pipeline.collector.is_none());
        assert_eq!(e.schema_key(), "com.acme/click");
    }

    #[test]
    fn test_mark_valid_clears_error() {
        let mut e = Envelope::new(Protocol::Pixel, "pixel", "k", "pixel", Map::new());
        e.mark_invalid(ValidationFailure::message("boom"));
        assert_eq!(e.validity(), Validity::Invalid);

        e.mark_valid();
        assert_eq!(e.validity(), Validity::Valid);
        assert!(e.pipeline.validation_error.is_none());
    }

    #[test]
    fn test_mark_invalid_records_failure() {
        let mut e = Envelope::new(Protocol::Snowplow, "snowplow", "k", "page_view", payload());
        e.mark_invalid(ValidationFailure::at("expected string", "/url"));

        let err = e.pipeline.validation_error.as_ref().unwrap();
        assert_eq!(err.path.as_deref(), Some("/url"));
        assert!(err.message.contains("expected string"));
    }

    #[test]
    fn test_serialize_skips_unset_fields() {
        let e = Envelope::new(Protocol::Webhook, "webhook", "", "webhook", Map::new());
        let json = serde_json::to_value(&e).unwrap();

        assert!(json["event_meta"].get("created_at").is_none());
        assert!(json["pipeline"].get("processed_at").is_none());
        assert!(json.get("context").is_none());
        assert!(json.get("contexts").is_none());
        assert_eq!(json["pipeline"]["validity"], "unknown");
    }

    #[test]
    fn test_json_round_trip() {
        let mut e = Envelope::new(Protocol::Cloudevents, "cloudevents", "schema/v1", "demo", payload());
        e.event_meta.created_at = Some(Utc::now());
        e.mark_valid();

        let json = serde_json::to_string(&e).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_meta.uuid, e.event_meta.uuid);
        assert_eq!(back.validity(), Validity::Valid);
        assert_eq!(back.payload, e.payload);
    }

    #[test]
    fn test_ingested_not_after_processed() {
        let mut e = Envelope::new(Protocol::Pixel, "pixel", "k", "pixel", Map::new());
        e.pipeline.processed_at = Some(Utc::now());
        assert!(e.event_meta.ingested_at <= e.pipeline.processed_at.unwrap());
    }
}
