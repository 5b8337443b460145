//! Response helpers
//!
//! Outcome-to-status translation shared by every adapter.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use buz_envelope::Envelope;
use buz_manifold::EnqueueError;
use serde_json::json;

use crate::AdapterState;

/// 1x1 transparent GIF served by pixel-style endpoints
pub(crate) const TRANSPARENT_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // GIF89a
    0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, // 1x1, one color
    0x00, 0x00, 0x00, 0xff, 0xff, 0xff, // palette
    0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // transparent
    0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // descriptor
    0x02, 0x02, 0x44, 0x01, 0x00, // data
    0x3b, // trailer
];

/// Enqueue envelopes in emission order, stopping at the first rejection
pub(crate) async fn enqueue_all(
    state: &AdapterState,
    envelopes: Vec<Envelope>,
) -> Result<(), EnqueueError> {
    for envelope in envelopes {
        state.manifold.enqueue(envelope).await?;
    }
    Ok(())
}

/// Translate an enqueue outcome into the adapter's response
pub(crate) fn outcome_response(
    outcome: Result<(), EnqueueError>,
    success: Response,
) -> Response {
    match outcome {
        Ok(()) => success,
        Err(EnqueueError::Overloaded) => {
            tracing::debug!("enqueue rejected: ingress full");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"ok": false, "error": "collector overloaded"})),
            )
                .into_response()
        }
        Err(EnqueueError::ShuttingDown) => {
            tracing::debug!("enqueue rejected: shutting down");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"ok": false, "error": "collector shutting down"})),
            )
                .into_response()
        }
    }
}

/// Success response for JSON protocols
pub(crate) fn ok_response() -> Response {
    (StatusCode::OK, Json(json!({"ok": true}))).into_response()
}

/// Success response for pixel-style GETs
pub(crate) fn gif_response() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/gif")],
        TRANSPARENT_GIF.to_vec(),
    )
        .into_response()
}

/// Producer error (body parse, contract violation)
pub(crate) fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"ok": false, "error": message.into()})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gif_is_wellformed() {
        assert_eq!(&TRANSPARENT_GIF[..6], b"GIF89a");
        assert_eq!(TRANSPARENT_GIF[TRANSPARENT_GIF.len() - 1], 0x3b);
    }

    #[test]
    fn test_outcome_statuses() {
        let ok = outcome_response(Ok(()), ok_response());
        assert_eq!(ok.status(), StatusCode::OK);

        let overloaded = outcome_response(Err(EnqueueError::Overloaded), ok_response());
        assert_eq!(overloaded.status(), StatusCode::TOO_MANY_REQUESTS);

        let closing = outcome_response(Err(EnqueueError::ShuttingDown), ok_response());
        assert_eq!(closing.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
