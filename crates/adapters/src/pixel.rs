//! Pixel adapter
//!
//! Tracking-pixel GETs: query parameters become the payload, the schema
//! key is fixed by configuration, and the response is always a 1x1
//! transparent GIF so embedding pages render nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use buz_envelope::{Envelope, Protocol};
use serde_json::{Map, Value};

use crate::response::{gif_response, outcome_response};
use crate::AdapterState;

/// Route served by the pixel adapter
pub const PIXEL_PATH: &str = "/pixel";

pub(crate) fn routes() -> Router<Arc<AdapterState>> {
    Router::new().route(PIXEL_PATH, get(handle))
}

async fn handle(
    State(state): State<Arc<AdapterState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let envelope = decode(&params, &state.config.pixel.schema_key);
    let outcome = state.manifold.enqueue(envelope).await;
    outcome_response(outcome, gif_response())
}

/// Build one envelope from pixel query parameters
pub(crate) fn decode(params: &BTreeMap<String, String>, schema_key: &str) -> Envelope {
    let mut payload = Map::new();
    for (key, value) in params {
        payload.insert(key.clone(), Value::String(value.clone()));
    }
    Envelope::new(Protocol::Pixel, "pixel", schema_key, "pixel", payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use buz_envelope::Validity;

    #[test]
    fn test_decode_query_params() {
        let mut params = BTreeMap::new();
        params.insert("url".to_string(), "/pricing".to_string());
        params.insert("campaign".to_string(), "spring".to_string());

        let envelope = decode(&params, "io.silverton/pixel/jsonschema/1-0-0");
        assert_eq!(envelope.event_meta.protocol, Protocol::Pixel);
        assert_eq!(envelope.schema_key(), "io.silverton/pixel/jsonschema/1-0-0");
        assert_eq!(envelope.payload["url"], "/pricing");
        assert_eq!(envelope.payload["campaign"], "spring");
        assert_eq!(envelope.validity(), Validity::Unknown);
    }

    #[test]
    fn test_decode_empty_query() {
        let envelope = decode(&BTreeMap::new(), "");
        assert!(envelope.payload.is_empty());
        assert!(envelope.schema_key().is_empty());
    }
}
