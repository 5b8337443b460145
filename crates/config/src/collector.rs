//! Collector identity configuration

use serde::Deserialize;

/// Identity stamped into every processed envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Deployment name
    pub name: String,

    /// Version string; defaults to the crate version
    pub version: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            name: "buz".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.name, "buz");
        assert!(!config.version.is_empty());
    }
}
