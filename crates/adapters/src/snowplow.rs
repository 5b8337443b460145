//! Snowplow adapter
//!
//! Accepts Snowplow tracker payloads two ways:
//!
//! - `POST /com.snowplowanalytics.snowplow/tp2` with a payload_data body:
//!   `{"schema": "...", "data": [event, event, ...]}`
//! - `GET /i` with one event encoded in the query string
//!
//! Self-describing events (`e=ue`) carry their schema in the `ue_pr` /
//! `ue_px` wrapper; primitive events (`e=pv`, `e=se`, ...) get a built-in
//! key inferred from the event code. Attached entities arrive in the
//! `co` / `cx` fields and land in `contexts`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use buz_envelope::{Envelope, Protocol};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::response::{bad_request, enqueue_all, gif_response, ok_response, outcome_response};
use crate::AdapterState;

/// Snowplow tracker POST path
pub const SNOWPLOW_POST_PATH: &str = "/com.snowplowanalytics.snowplow/tp2";

/// Snowplow pixel GET path
pub const SNOWPLOW_GET_PATH: &str = "/i";

pub(crate) fn routes() -> Router<Arc<AdapterState>> {
    Router::new()
        .route(SNOWPLOW_POST_PATH, post(handle_post))
        .route(SNOWPLOW_GET_PATH, get(handle_get))
}

async fn handle_post(State(state): State<Arc<AdapterState>>, body: String) -> Response {
    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => return bad_request(format!("invalid JSON body: {e}")),
    };

    let envelopes = match decode_payload_data(value) {
        Ok(envelopes) => envelopes,
        Err(message) => return bad_request(message),
    };

    let outcome = enqueue_all(&state, envelopes).await;
    outcome_response(outcome, ok_response())
}

async fn handle_get(
    State(state): State<Arc<AdapterState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let mut event = Map::new();
    for (key, value) in params {
        event.insert(key, Value::String(value));
    }

    let envelope = decode_event(event);
    let outcome = state.manifold.enqueue(envelope).await;
    outcome_response(outcome, gif_response())
}

/// Decode a tp2 payload_data body into envelopes, in emission order
pub(crate) fn decode_payload_data(body: Value) -> Result<Vec<Envelope>, String> {
    let Value::Object(mut wrapper) = body else {
        return Err(format!("expected payload_data object, got {body}"));
    };

    let events = match wrapper.remove("data") {
        Some(Value::Array(events)) => events,
        _ => return Err("payload_data requires a data array".into()),
    };

    let mut envelopes = Vec::with_capacity(events.len());
    for event in events {
        match event {
            Value::Object(map) => envelopes.push(decode_event(map)),
            other => return Err(format!("expected event object, got {other}")),
        }
    }
    Ok(envelopes)
}

/// Decode one tracker event
///
/// Never fails: undecodable pieces degrade to an envelope the annotator
/// will mark invalid, so the bytes are kept rather than bounced.
pub(crate) fn decode_event(event: Map<String, Value>) -> Envelope {
    let event_code = event.get("e").and_then(Value::as_str).unwrap_or("");
    let event_type = event_type_for(event_code);

    let (schema_key, payload) = match event_code {
        "ue" => decode_self_describing(&event),
        _ => (inferred_schema_key(event_type), event.clone()),
    };

    let contexts = decode_contexts(&event);
    let created_at = event
        .get("dtm")
        .and_then(Value::as_str)
        .and_then(|millis| millis.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis);

    let mut envelope = Envelope::new(
        Protocol::Snowplow,
        "snowplow",
        schema_key,
        event_type,
        payload,
    )
    .with_context(event);

    envelope.event_meta.created_at = created_at;
    if let Some(contexts) = contexts {
        envelope = envelope.with_contexts(contexts);
    }
    envelope
}

/// Tracker event code to event type
fn event_type_for(code: &str) -> &'static str {
    match code {
        "pv" => "page_view",
        "pp" => "page_ping",
        "se" => "struct_event",
        "ue" => "self_describing",
        "tr" => "transaction",
        "ti" => "transaction_item",
        _ => "unknown",
    }
}

/// Built-in schema key for primitive tracker events
fn inferred_schema_key(event_type: &str) -> String {
    format!("com.snowplowanalytics.snowplow/{event_type}/jsonschema/1-0-0")
}

/// Extract the inner schema and payload of a self-describing event
///
/// The `ue_pr` (plain JSON) or `ue_px` (base64 JSON) field holds
/// `{"schema": <unstruct wrapper>, "data": {"schema": key, "data": {...}}}`.
fn decode_self_describing(event: &Map<String, Value>) -> (String, Map<String, Value>) {
    let wrapper = event
        .get("ue_pr")
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .or_else(|| {
            event
                .get("ue_px")
                .and_then(Value::as_str)
                .and_then(decode_base64_json)
        });

    let Some(inner) = wrapper.as_ref().and_then(|w| w.get("data")) else {
        // No usable wrapper: keep the raw event so the invalid lane sees it
        return (String::new(), event.clone());
    };

    let schema_key = inner
        .get("schema")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let payload = match inner.get("data") {
        Some(Value::Object(data)) => data.clone(),
        _ => Map::new(),
    };

    (schema_key, payload)
}

/// Extract attached entities from `co` (plain) or `cx` (base64)
fn decode_contexts(event: &Map<String, Value>) -> Option<Vec<Value>> {
    let wrapper = event
        .get("co")
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .or_else(|| {
            event
                .get("cx")
                .and_then(Value::as_str)
                .and_then(decode_base64_json)
        })?;

    match wrapper.get("data") {
        Some(Value::Array(entities)) => Some(entities.clone()),
        _ => None,
    }
}

/// Decode base64 (standard or url-safe) JSON
fn decode_base64_json(encoded: &str) -> Option<Value> {
    let bytes = STANDARD
        .decode(encoded)
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}
