//! Annotator - verdict stamping
//!
//! Turns an unknown-class envelope into a valid- or invalid-class envelope.
//! Purely functional over (envelope, cache, collector metadata): it never
//! mutates the cache or touches sinks, and re-annotating a resolved
//! envelope is a no-op.

use buz_envelope::{CollectorMeta, Envelope, ValidationFailure};
use buz_registry::{RegistryError, SchemaCache};
use chrono::Utc;

/// Resolve the schema, validate the payload, stamp the verdict
///
/// Schema and validation failures become envelope verdicts, never errors:
/// an envelope always comes back resolved.
pub async fn annotate(
    mut envelope: Envelope,
    cache: &SchemaCache,
    collector: &CollectorMeta,
) -> Envelope {
    // Idempotence: a resolved envelope passes through untouched
    if envelope.validity().is_resolved() {
        return envelope;
    }

    envelope.pipeline.processed_at = Some(Utc::now());
    envelope.pipeline.collector = Some(collector.clone());

    let key = envelope.schema_key().to_string();
    if key.is_empty() {
        envelope.mark_invalid(ValidationFailure::message("MissingSchemaKey"));
        return envelope;
    }

    let entry = match cache.get(&key).await {
        Ok(entry) => entry,
        Err(RegistryError::NotFound { .. }) => {
            envelope.mark_invalid(ValidationFailure::message(format!("SchemaNotFound({key})")));
            return envelope;
        }
        Err(RegistryError::FetchFailed { cause, .. }) => {
            // Transient: the registry was unreachable, not the schema wrong.
            // Still an invalid verdict - see the route overview docs.
            envelope.mark_invalid(ValidationFailure::message(format!(
                "SchemaUnavailable({key}): {cause}"
            )));
            return envelope;
        }
        Err(RegistryError::CompileFailed { cause, .. }) => {
            envelope.mark_invalid(ValidationFailure::message(format!(
                "SchemaInvalid({key}): {cause}"
            )));
            return envelope;
        }
    };

    let Some(validator) = entry.validator.as_ref() else {
        // cache.get() never returns an uncompiled entry
        envelope.mark_invalid(ValidationFailure::message(format!("SchemaInvalid({key})")));
        return envelope;
    };

    let instance = serde_json::Value::Object(envelope.payload.clone());
    match validator.validate(&instance) {
        Ok(()) => envelope.mark_valid(),
        Err(violation) => {
            let path = violation.instance_path.to_string();
            envelope.mark_invalid(ValidationFailure::at(violation.to_string(), path));
        }
    }

    envelope
}

#[cfg(test)]
mod tests {
    use super::*;
    use buz_envelope::{Protocol, Validity};
    use buz_registry::MemoryBackend;
    use serde_json::{json, Map, Value};
    use std::time::Duration;

    const URL_SCHEMA: &[u8] =
        br#"{"type":"object","properties":{"url":{"type":"string"}},"required":["url"]}"#;

    fn cache() -> SchemaCache {
        let backend = MemoryBackend::new();
        backend.insert("com.acme/click/jsonschema/1-0-0", URL_SCHEMA.to_vec());
        SchemaCache::new(Box::new(backend), None, Duration::from_secs(5))
    }

    fn meta() -> CollectorMeta {
        CollectorMeta::new("buz", "test")
    }

    fn envelope_with(key: &str, payload: Value) -> Envelope {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Envelope::new(Protocol::Webhook, "webhook", key, "webhook", payload)
    }

    #[tokio::test]
    async fn test_valid_payload() {
        let cache = cache();
        let e = envelope_with("com.acme/click/jsonschema/1-0-0", json!({"url": "/home"}));

        let annotated = annotate(e, &cache, &meta()).await;
        assert_eq!(annotated.validity(), Validity::Valid);
        assert!(annotated.pipeline.processed_at.is_some());
        assert_eq!(annotated.pipeline.collector.as_ref().unwrap().name, "buz");
        assert!(annotated.event_meta.ingested_at <= annotated.pipeline.processed_at.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_payload_records_path() {
        let cache = cache();
        let e = envelope_with("com.acme/click/jsonschema/1-0-0", json!({"url": 7}));

        let annotated = annotate(e, &cache, &meta()).await;
        assert_eq!(annotated.validity(), Validity::Invalid);

        let failure = annotated.pipeline.validation_error.unwrap();
        assert_eq!(failure.path.as_deref(), Some("/url"));
    }

    #[tokio::test]
    async fn test_missing_schema_key() {
        let cache = cache();
        let e = envelope_with("", json!({"url": "/home"}));

        let annotated = annotate(e, &cache, &meta()).await;
        assert_eq!(annotated.validity(), Validity::Invalid);
        assert_eq!(
            annotated.pipeline.validation_error.unwrap().message,
            "MissingSchemaKey"
        );
    }

    #[tokio::test]
    async fn test_schema_not_found() {
        let cache = cache();
        let e = envelope_with("com.acme/unknown/jsonschema/1-0-0", json!({}));

        let annotated = annotate(e, &cache, &meta()).await;
        assert_eq!(annotated.validity(), Validity::Invalid);
        let message = annotated.pipeline.validation_error.unwrap().message;
        assert!(message.starts_with("SchemaNotFound("));
        assert!(message.contains("com.acme/unknown"));
    }

    #[tokio::test]
    async fn test_schema_that_fails_to_compile() {
        let backend = MemoryBackend::new();
        backend.insert("broken", b"{not json".to_vec());
        let cache = SchemaCache::new(Box::new(backend), None, Duration::from_secs(5));

        let e = envelope_with("broken", json!({}));
        let annotated = annotate(e, &cache, &meta()).await;
        assert_eq!(annotated.validity(), Validity::Invalid);
        assert!(annotated
            .pipeline
            .validation_error
            .unwrap()
            .message
            .starts_with("SchemaInvalid("));
    }

    #[tokio::test]
    async fn test_schema_unavailable_on_timeout() {
        let backend = MemoryBackend::new().with_latency(Duration::from_millis(500));
        backend.insert("slow", URL_SCHEMA.to_vec());
        let cache = SchemaCache::new(Box::new(backend), None, Duration::from_millis(10));

        let e = envelope_with("slow", json!({"url": "x"}));
        let annotated = annotate(e, &cache, &meta()).await;
        assert_eq!(annotated.validity(), Validity::Invalid);
        assert!(annotated
            .pipeline
            .validation_error
            .unwrap()
            .message
            .starts_with("SchemaUnavailable("));
    }

    #[tokio::test]
    async fn test_empty_payload_against_permissive_schema() {
        let backend = MemoryBackend::new();
        backend.insert("open", br#"{"type":"object"}"#.to_vec());
        let cache = SchemaCache::new(Box::new(backend), None, Duration::from_secs(5));

        let e = envelope_with("open", json!({}));
        let annotated = annotate(e, &cache, &meta()).await;
        assert_eq!(annotated.validity(), Validity::Valid);
    }

    #[tokio::test]
    async fn test_annotate_is_idempotent() {
        let cache = cache();
        let e = envelope_with("com.acme/click/jsonschema/1-0-0", json!({"url": "/home"}));

        let once = annotate(e, &cache, &meta()).await;
        let processed_at = once.pipeline.processed_at;
        let twice = annotate(once.clone(), &cache, &meta()).await;

        assert_eq!(twice.validity(), once.validity());
        assert_eq!(twice.pipeline.processed_at, processed_at);
        // The second call never re-resolved: one fetch total
        assert_eq!(cache.stats().fetches, 1);
    }
}
