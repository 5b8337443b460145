//! Self-describing adapter
//!
//! Payloads carry their own schema key: `{"schema": "...", "data": {...}}`.
//! Arrays of such objects are accepted and decode in order.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use buz_envelope::{Envelope, Protocol};
use serde_json::Value;

use crate::response::{bad_request, enqueue_all, ok_response, outcome_response};
use crate::AdapterState;

/// Route served by the self-describing adapter
pub const SELF_DESCRIBING_PATH: &str = "/sd";

pub(crate) fn routes() -> Router<Arc<AdapterState>> {
    Router::new().route(SELF_DESCRIBING_PATH, post(handle))
}

async fn handle(State(state): State<Arc<AdapterState>>, body: String) -> Response {
    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => return bad_request(format!("invalid JSON body: {e}")),
    };

    let envelopes = match decode(value) {
        Ok(envelopes) => envelopes,
        Err(message) => return bad_request(message),
    };

    let outcome = enqueue_all(&state, envelopes).await;
    outcome_response(outcome, ok_response())
}

/// Decode one or many self-describing payloads
pub(crate) fn decode(body: Value) -> Result<Vec<Envelope>, String> {
    let items = match body {
        Value::Array(values) => values,
        single => vec![single],
    };

    let mut envelopes = Vec::with_capacity(items.len());
    for item in items {
        envelopes.push(decode_one(item)?);
    }
    Ok(envelopes)
}

fn decode_one(value: Value) -> Result<Envelope, String> {
    let Value::Object(mut map) = value else {
        return Err(format!("expected object, got {value}"));
    };

    let schema_key = match map.get("schema") {
        Some(Value::String(key)) => key.clone(),
        Some(other) => return Err(format!("schema attribute must be a string, got {other}")),
        // Missing key still yields an envelope; the annotator flags it
        None => String::new(),
    };

    let payload = match map.remove("data") {
        Some(Value::Object(data)) => data,
        Some(other) => return Err(format!("data attribute must be an object, got {other}")),
        None => return Err("missing data attribute".into()),
    };

    Ok(Envelope::new(
        Protocol::SelfDescribing,
        "self_describing",
        schema_key,
        "self_describing",
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_single() {
        let envelopes = decode(json!({
            "schema": "iglu:com.acme/click/jsonschema/1-0-0",
            "data": {"url": "/home"}
        }))
        .unwrap();

        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].schema_key(), "iglu:com.acme/click/jsonschema/1-0-0");
        assert_eq!(envelopes[0].payload["url"], "/home");
        assert_eq!(envelopes[0].event_meta.protocol, Protocol::SelfDescribing);
    }

    #[test]
    fn test_decode_array() {
        let envelopes = decode(json!([
            {"schema": "a", "data": {"n": 1}},
            {"schema": "b", "data": {"n": 2}}
        ]))
        .unwrap();

        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].schema_key(), "a");
        assert_eq!(envelopes[1].schema_key(), "b");
    }

    #[test]
    fn test_missing_schema_still_decodes() {
        let envelopes = decode(json!({"data": {"n": 1}})).unwrap();
        assert!(envelopes[0].schema_key().is_empty());
    }

    #[test]
    fn test_missing_data_rejected() {
        assert!(decode(json!({"schema": "a"})).is_err());
    }

    #[test]
    fn test_round_trip_preserves_payload() {
        let original = json!({
            "schema": "iglu:com.acme/click/jsonschema/1-0-0",
            "data": {"url": "/home", "count": 3, "nested": {"deep": true}}
        });

        let envelope = &decode(original.clone()).unwrap()[0];
        let encoded = json!({
            "schema": envelope.schema_key(),
            "data": Value::Object(envelope.payload.clone()),
        });
        assert_eq!(encoded, original);
    }
}
