//! Collector metadata
//!
//! Built once at startup and stamped into every envelope by the annotator,
//! so downstream consumers can tell which collector instance (and version)
//! processed an event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the running collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorMeta {
    /// Deployment name (e.g. "buz")
    pub name: String,

    /// Collector version string
    pub version: String,

    /// Random per-process instance id
    pub instance_id: Uuid,

    /// When this instance started
    pub started_at: DateTime<Utc>,
}

impl CollectorMeta {
    /// Build collector metadata for this process
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            instance_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_ids_are_unique() {
        let a = CollectorMeta::new("buz", "0.1.0");
        let b = CollectorMeta::new("buz", "0.1.0");
        assert_ne!(a.instance_id, b.instance_id);
    }

    #[test]
    fn test_serialize_round_trip() {
        let meta = CollectorMeta::new("buz", "1.2.3");
        let json = serde_json::to_string(&meta).unwrap();
        let back: CollectorMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }
}
