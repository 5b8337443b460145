//! Buz - Protocol Adapters
//!
//! HTTP handlers that decode incoming requests into zero-or-more envelopes
//! and offer them to the manifold.
//!
//! # Endpoints
//!
//! - `GET /pixel` - tracking pixel with a fixed configured schema key
//! - `POST /webhook/{*path}` - JSON webhooks with path-mapped schema keys
//! - `POST /cloudevents` - CloudEvents v1.0, single or batch
//! - `POST /sd` - self-describing `{schema, data}` payloads
//! - `POST /com.snowplowanalytics.snowplow/tp2` - Snowplow tracker payloads
//! - `GET /i` - Snowplow pixel GETs
//!
//! # Outcome translation
//!
//! Adapters see only ingress-layer outcomes from the manifold and translate
//! them to HTTP status: accepted maps to the protocol's success response
//! (a 1x1 GIF for pixel-style GETs, `{"ok":true}` for JSON POSTs),
//! `Overloaded` to 429, `ShuttingDown` to 503. Body decode failures are
//! 400s. Sink trouble never surfaces here.

mod cloudevents;
mod pixel;
mod response;
mod selfdescribing;
mod snowplow;
mod webhook;

use std::sync::Arc;

use axum::Router;
use buz_config::AdaptersConfig;
use buz_manifold::Manifold;

pub use cloudevents::CLOUDEVENTS_PATH;
pub use pixel::PIXEL_PATH;
pub use selfdescribing::SELF_DESCRIBING_PATH;
pub use snowplow::{SNOWPLOW_GET_PATH, SNOWPLOW_POST_PATH};
pub use webhook::WEBHOOK_PATH;

/// Shared state handed to every adapter handler
pub struct AdapterState {
    /// Pipeline handle; adapters only ever call `enqueue`
    pub manifold: Manifold,

    /// Adapter settings (pixel schema key, webhook mappings)
    pub config: AdaptersConfig,
}

impl AdapterState {
    /// Bundle a manifold handle with adapter settings
    pub fn new(manifold: Manifold, config: AdaptersConfig) -> Self {
        Self { manifold, config }
    }
}

/// Build a router with every enabled adapter mounted
///
/// The outer server layers middleware and serves this; adapters never
/// touch the listener themselves.
pub fn router(state: Arc<AdapterState>) -> Router {
    let mut router = Router::new()
        .merge(cloudevents::routes())
        .merge(selfdescribing::routes())
        .merge(snowplow::routes());

    if state.config.pixel.enabled {
        router = router.merge(pixel::routes());
    }
    if state.config.webhook.enabled {
        router = router.merge(webhook::routes());
    }

    router.with_state(state)
}
