//! Buz Configuration
//!
//! TOML-based configuration with sensible defaults. A minimal config should
//! just work - only specify what you need to change.
//!
//! # Example Minimal Config
//!
//! ```toml
//! [registry]
//! type = "fs"
//! root = "schemas/"
//!
//! [sinks.stdout]
//! type = "stdout"
//! ```
//!
//! # Example Fuller Config
//!
//! ```toml
//! [collector]
//! name = "buz-edge"
//!
//! [manifold]
//! workers = 8
//! batch_size = 500
//! batch_age = "250ms"
//!
//! [registry]
//! type = "http"
//! base_url = "https://registry.example.com/schemas"
//! cache_ttl = "5m"
//!
//! [sinks.lake]
//! type = "file"
//! path = "events.ndjson"
//! accept = "valid"
//! delivery_required = true
//!
//! [sinks.dead_letter]
//! type = "file"
//! path = "invalid.ndjson"
//! accept = "invalid"
//! ```

mod adapters;
mod collector;
mod error;
mod manifold;
mod registry;
mod sinks;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use adapters::{AdaptersConfig, PixelAdapterConfig, WebhookAdapterConfig};
pub use collector::CollectorConfig;
pub use error::{ConfigError, Result};
pub use manifold::ManifoldConfig;
pub use registry::RegistryConfig;
pub use sinks::{
    BlackholeSinkConfig, FileSinkConfig, HttpSinkConfig, SinkConfig, SinksConfig,
    StdoutSinkConfig,
};

/// Main configuration structure
///
/// All sections are optional with defaults; `validate()` enforces the
/// cross-field requirements.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collector identity
    pub collector: CollectorConfig,

    /// Pipeline tuning (queues, workers, batching, timeouts)
    pub manifold: ManifoldConfig,

    /// Schema registry backend and cache
    pub registry: RegistryConfig,

    /// Named sink instances
    pub sinks: SinksConfig,

    /// Protocol adapter settings
    pub adapters: AdaptersConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        contents.parse()
    }

    /// Validate cross-field requirements
    ///
    /// Called automatically by `from_file` / `FromStr`; exposed for configs
    /// assembled in code.
    pub fn validate(&self) -> Result<()> {
        if self.sinks.is_empty() {
            return Err(ConfigError::NoSinks);
        }
        for (name, sink) in self.sinks.iter() {
            sink.validate(name)?;
        }
        self.registry.validate()?;
        self.manifold.validate()?;
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: Config = r#"
[registry]
type = "fs"
root = "schemas/"

[sinks.stdout]
type = "stdout"
"#
        .parse()
        .unwrap();

        assert_eq!(config.collector.name, "buz");
        assert_eq!(config.sinks.len(), 1);
    }

    #[test]
    fn test_empty_config_rejected() {
        let err = "".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::NoSinks));
    }

    #[test]
    fn test_full_config() {
        let config: Config = r#"
[collector]
name = "buz-edge"
version = "9.9.9"

[manifold]
workers = 8
ingress_capacity = 4096
batch_size = 500
batch_age = "250ms"
publish_timeout = "10s"

[registry]
type = "http"
base_url = "https://registry.example.com/schemas"
cache_ttl = "5m"

[sinks.lake]
type = "file"
path = "events.ndjson"
accept = "valid"
delivery_required = true

[sinks.dead_letter]
type = "file"
path = "invalid.ndjson"
accept = "invalid"

[adapters.pixel]
schema_key = "io.silverton/pixel/jsonschema/1-0-0"

[adapters.webhook]
mappings = { "orders/created" = "com.shop/order_created/jsonschema/1-0-0" }
"#
        .parse()
        .unwrap();

        assert_eq!(config.collector.name, "buz-edge");
        assert_eq!(config.manifold.workers, 8);
        assert_eq!(config.sinks.len(), 2);
        assert!(config.adapters.webhook.mappings.contains_key("orders/created"));
    }

    #[test]
    fn test_file_sink_requires_path() {
        let err = r#"
[registry]
type = "memory"

[sinks.lake]
type = "file"
"#
        .parse::<Config>()
        .unwrap_err();
        assert!(err.to_string().contains("path"));
    }
}
