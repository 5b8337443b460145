//! CloudEvents adapter
//!
//! Structured-mode CloudEvents v1.0 JSON, single events or batches. The
//! `dataschema` attribute carries the schema key, `data` becomes the
//! payload, and `time` (RFC 3339) becomes the producer timestamp.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use buz_envelope::{Envelope, Protocol};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::response::{bad_request, enqueue_all, ok_response, outcome_response};
use crate::AdapterState;

/// Route served by the CloudEvents adapter
pub const CLOUDEVENTS_PATH: &str = "/cloudevents";

pub(crate) fn routes() -> Router<Arc<AdapterState>> {
    Router::new().route(CLOUDEVENTS_PATH, post(handle))
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

/// Decode one CloudEvent or a batch
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
    let Value::Object(mut event) = value else {
        return Err(format!("expected CloudEvent object, got {value}"));
    };

    let schema_key = match event.get("dataschema") {
        Some(Value::String(key)) => key.clone(),
        _ => String::new(),
    };
    let event_type = match event.get("type") {
        Some(Value::String(t)) => t.clone(),
        _ => "cloudevent".to_string(),
    };

    let payload = match event.remove("data") {
        Some(Value::Object(data)) => data,
        Some(other) => {
            // Scalar or array data is legal in CloudEvents; keep it addressable
            let mut map = Map::new();
            map.insert("data".into(), other);
            map
        }
        None => Map::new(),
    };

    // Everything but the payload rides along as producer context
    let created_at = event
        .get("time")
        .and_then(Value::as_str)
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));

    let mut envelope = Envelope::new(
        Protocol::Cloudevents,
        "cloudevents",
        schema_key,
        event_type,
        payload,
    )
    .with_context(event);

    envelope.event_meta.created_at = created_at;
    Ok(envelope)
}
