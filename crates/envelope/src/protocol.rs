//! Source protocol tags
//!
//! Identifies which adapter produced an envelope. Schema-key extraction is
//! adapter-specific; the tag itself is only used for labeling and stats.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The wire protocol an envelope arrived over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Snowplow tracker payloads (tp2 POST bodies or `/i` pixel GETs)
    Snowplow,

    /// CloudEvents v1.0 structured-mode JSON
    Cloudevents,

    /// Self-describing `{schema, data}` JSON
    SelfDescribing,

    /// Arbitrary JSON webhooks with path-mapped schema keys
    Webhook,

    /// Tracking-pixel GETs with a fixed configured schema key
    Pixel,
}

impl Protocol {
    /// Stable lowercase name, used in logs and stats
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snowplow => "snowplow",
            Self::Cloudevents => "cloudevents",
            Self::SelfDescribing => "self_describing",
            Self::Webhook => "webhook",
            Self::Pixel => "pixel",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
