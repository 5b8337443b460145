//! Webhook adapter
//!
//! Accepts arbitrary JSON on `/webhook/{*path}`. The request path selects
//! the schema key through the configured mapping; unmapped paths still
//! produce envelopes, which the annotator then marks invalid for lacking a
//! schema key. An array body yields one envelope per element, in order.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use buz_envelope::{Envelope, Protocol};
use serde_json::Value;

use crate::response::{bad_request, enqueue_all, ok_response, outcome_response};
use crate::AdapterState;

/// Route prefix served by the webhook adapter
pub const WEBHOOK_PATH: &str = "/webhook/{*path}";

pub(crate) fn routes() -> Router<Arc<AdapterState>> {
    Router::new().route(WEBHOOK_PATH, post(handle))
}

async fn handle(
    State(state): State<Arc<AdapterState>>,
    Path(path): Path<String>,
    body: String,
) -> Response {
    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => return bad_request(format!("invalid JSON body: {e}")),
    };

    let schema_key = state.config.webhook.schema_key_for(&path);
    let envelopes = match decode(value, schema_key) {
        Ok(envelopes) => envelopes,
        Err(message) => return bad_request(message),
    };

    let outcome = enqueue_all(&state, envelopes).await;
    outcome_response(outcome, ok_response())
}

/// Decode a webhook body into envelopes
///
/// Objects yield one envelope; arrays yield one per object element.
pub(crate) fn decode(body: Value, schema_key: &str) -> Result<Vec<Envelope>, String> {
    let items = match body {
        Value::Object(map) => vec![map],
        Value::Array(values) => {
            let mut maps = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Object(map) => maps.push(map),
                    other => return Err(format!("expected object in array, got {other}")),
                }
            }
            maps
        }
        other => return Err(format!("expected object or array body, got {other}")),
    };

    Ok(items
        .into_iter()
        .map(|payload| Envelope::new(Protocol::Webhook, "webhook", schema_key, "webhook", payload))
        .collect())
}
