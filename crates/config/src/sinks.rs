//! Sink configuration types
//!
//! Sinks are named instances, allowing multiple sinks of the same type
//! (e.g. a valid-events file and an invalid-events dead letter file). The
//! variant is selected by the `type` tag; every variant carries the common
//! routing fields `accept` and `delivery_required`.

use std::collections::BTreeMap;
use std::time::Duration;

use buz_envelope::AcceptedClass;
use serde::Deserialize;

use crate::{ConfigError, Result};

/// Container for all sink configurations
///
/// # Example
///
/// ```toml
/// [sinks.stdout]
/// type = "stdout"
///
/// [sinks.lake]
/// type = "file"
/// path = "events.ndjson"
/// accept = "valid"
///
/// [sinks.upstream]
/// type = "http"
/// url = "https://collector.example.com/ingest"
/// delivery_required = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// Named sink instances
    #[serde(flatten)]
    sinks: BTreeMap<String, SinkConfig>,
}

impl SinksConfig {
    /// Get a sink by name
    pub fn get(&self, name: &str) -> Option<&SinkConfig> {
        self.sinks.get(name)
    }

    /// Iterate over all sinks in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SinkConfig)> {
        self.sinks.iter()
    }

    /// Number of configured sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sinks are configured
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Insert a sink (programmatic assembly, mostly tests)
    pub fn insert(&mut self, name: impl Into<String>, config: SinkConfig) {
        self.sinks.insert(name.into(), config);
    }
}

/// Configuration for a single sink instance
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// NDJSON lines to stdout (debug)
    Stdout(StdoutSinkConfig),

    /// Buffered NDJSON appender
    File(FileSinkConfig),

    /// Forward NDJSON batches to a remote collector
    Http(HttpSinkConfig),

    /// Count and discard (benchmarks, tests)
    Blackhole(BlackholeSinkConfig),
}

impl SinkConfig {
    /// Sink type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Stdout(_) => "stdout",
            Self::File(_) => "file",
            Self::Http(_) => "http",
            Self::Blackhole(_) => "blackhole",
        }
    }

    /// Which envelope classes this sink accepts
    pub fn accept(&self) -> AcceptedClass {
        match self {
            Self::Stdout(c) => c.accept,
            Self::File(c) => c.accept,
            Self::Http(c) => c.accept,
            Self::Blackhole(c) => c.accept,
        }
    }

    /// Whether overflow drops are forbidden for this sink
    pub fn delivery_required(&self) -> bool {
        match self {
            Self::Stdout(c) => c.delivery_required,
            Self::File(c) => c.delivery_required,
            Self::Http(c) => c.delivery_required,
            Self::Blackhole(c) => c.delivery_required,
        }
    }

    /// Check required fields
    pub fn validate(&self, name: &str) -> Result<()> {
        match self {
            Self::File(c) if c.path.is_empty() => {
                Err(ConfigError::missing_field("sink", name, "path"))
            }
            Self::Http(c) if c.url.is_empty() => {
                Err(ConfigError::missing_field("sink", name, "url"))
            }
            _ => Ok(()),
        }
    }
}

/// Stdout sink configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StdoutSinkConfig {
    /// Envelope classes to accept
    pub accept: AcceptedClass,

    /// Forbid drops on queue overflow
    pub delivery_required: bool,
}

/// File sink configuration
///
/// # Example
///
/// ```toml
/// [sinks.lake]
/// type = "file"
/// path = "events.ndjson"
/// accept = "valid"
/// buffer_size = 65536
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    /// Output file path
    /// Required
    pub path: String,

    /// Writer buffer size in bytes
    /// Default: 64KB
    pub buffer_size: usize,

    /// Envelope classes to accept
    pub accept: AcceptedClass,

    /// Forbid drops on queue overflow
    pub delivery_required: bool,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            buffer_size: 64 * 1024,
            accept: AcceptedClass::All,
            delivery_required: false,
        }
    }
}

/// HTTP forwarder sink configuration
///
/// # Example
///
/// ```toml
/// [sinks.upstream]
/// type = "http"
/// url = "https://collector.example.com/ingest"
/// write_timeout = "5s"
/// delivery_required = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSinkConfig {
    /// Target URL for NDJSON POST bodies
    /// Required
    pub url: String,

    /// Per-request write timeout
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    /// Envelope classes to accept
    pub accept: AcceptedClass,

    /// Forbid drops on queue overflow
    pub delivery_required: bool,
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            write_timeout: Duration::from_secs(5),
            accept: AcceptedClass::All,
            delivery_required: false,
        }
    }
}

/// Blackhole sink configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlackholeSinkConfig {
    /// Envelope classes to accept
    pub accept: AcceptedClass,

    /// Forbid drops on queue overflow
    pub delivery_required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_stdout() {
        let config: SinksConfig = toml::from_str(
            r#"
[stdout]
type = "stdout"
"#,
        )
        .unwrap();
        let sink = config.get("stdout").unwrap();
        assert_eq!(sink.type_name(), "stdout");
        assert_eq!(sink.accept(), AcceptedClass::All);
        assert!(!sink.delivery_required());
    }

    #[test]
    fn test_deserialize_multiple_sinks() {
        let config: SinksConfig = toml::from_str(
            r#"
[lake]
type = "file"
path = "events.ndjson"
accept = "valid"
delivery_required = true

[dead_letter]
type = "file"
path = "invalid.ndjson"
accept = "invalid"

[upstream]
type = "http"
url = "https://collector.example.com/ingest"
write_timeout = "10s"
"#,
        )
        .unwrap();

        assert_eq!(config.len(), 3);

        let lake = config.get("lake").unwrap();
        assert_eq!(lake.accept(), AcceptedClass::Valid);
        assert!(lake.delivery_required());

        if let Some(SinkConfig::Http(http)) = config.get("upstream") {
            assert_eq!(http.url, "https://collector.example.com/ingest");
            assert_eq!(http.write_timeout, Duration::from_secs(10));
        } else {
            panic!("expected http config");
        }
    }

    #[test]
    fn test_file_sink_defaults() {
        let config = FileSinkConfig::default();
        assert_eq!(config.buffer_size, 64 * 1024);
        assert_eq!(config.accept, AcceptedClass::All);
        assert!(!config.delivery_required);
    }

    #[test]
    fn test_validate_missing_path() {
        let sink = SinkConfig::File(FileSinkConfig::default());
        assert!(sink.validate("lake").is_err());
    }

    #[test]
    fn test_validate_missing_url() {
        let sink = SinkConfig::Http(HttpSinkConfig::default());
        assert!(sink.validate("upstream").is_err());
    }

    #[test]
    fn test_empty_sinks() {
        let config: SinksConfig = toml::from_str("").unwrap();
        assert!(config.is_empty());
    }
}
