//! Manifold tuning configuration
//!
//! Queue capacities, worker counts, batching, and the timeouts that bound
//! every I/O call and shutdown phase in the pipeline.

use std::time::Duration;

use serde::Deserialize;

use crate::{ConfigError, Result};

/// Pipeline tuning knobs
///
/// # Example
///
/// ```toml
/// [manifold]
/// ingress_capacity = 8192
/// workers = 4
/// sink_queue_capacity = 1024
/// batch_size = 100
/// batch_age = "500ms"
/// enqueue_wait = "0s"
/// fetch_timeout = "5s"
/// publish_timeout = "30s"
/// drain_ingress_timeout = "10s"
/// drain_sinks_timeout = "15s"
/// max_attempts = 5
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManifoldConfig {
    /// Ingress queue capacity
    pub ingress_capacity: usize,

    /// Number of annotator workers draining ingress
    pub workers: usize,

    /// Per-sink queue capacity
    pub sink_queue_capacity: usize,

    /// Maximum envelopes per published batch
    pub batch_size: usize,

    /// Maximum age of an open batch before it is published
    #[serde(with = "humantime_serde")]
    pub batch_age: Duration,

    /// How long `enqueue` may wait for ingress capacity (0 = non-blocking)
    #[serde(with = "humantime_serde")]
    pub enqueue_wait: Duration,

    /// Per-call timeout for registry fetches
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// Per-call timeout for sink publishes
    #[serde(with = "humantime_serde")]
    pub publish_timeout: Duration,

    /// Shutdown bound for draining the ingress queue
    #[serde(with = "humantime_serde")]
    pub drain_ingress_timeout: Duration,

    /// Shutdown bound for draining sink queues and final flushes
    #[serde(with = "humantime_serde")]
    pub drain_sinks_timeout: Duration,

    /// Publish attempts before a batch is dropped (delivery-required sinks
    /// retry without bound and ignore this)
    pub max_attempts: usize,
}

impl Default for ManifoldConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: 8192,
            workers: 4,
            sink_queue_capacity: 1024,
            batch_size: 100,
            batch_age: Duration::from_millis(500),
            enqueue_wait: Duration::ZERO,
            fetch_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(30),
            drain_ingress_timeout: Duration::from_secs(10),
            drain_sinks_timeout: Duration::from_secs(15),
            max_attempts: 5,
        }
    }
}

impl ManifoldConfig {
    /// Check values that would wedge the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ConfigError::invalid_value(
                "manifold",
                "manifold",
                "workers",
                "must be at least 1",
            ));
        }
        if self.ingress_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "manifold",
                "manifold",
                "ingress_capacity",
                "must be at least 1",
            ));
        }
        if self.sink_queue_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "manifold",
                "manifold",
                "sink_queue_capacity",
                "must be at least 1",
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid_value(
                "manifold",
                "manifold",
                "batch_size",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManifoldConfig::default();
        assert_eq!(config.ingress_capacity, 8192);
        assert_eq!(config.workers, 4);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_age, Duration::from_millis(500));
        assert_eq!(config.enqueue_wait, Duration::ZERO);
        assert_eq!(config.max_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = ManifoldConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_humantime_parsing() {
        let config: ManifoldConfig = toml::from_str(
            r#"
batch_age = "2s"
publish_timeout = "1m"
"#,
        )
        .unwrap();
        assert_eq!(config.batch_age, Duration::from_secs(2));
        assert_eq!(config.publish_timeout, Duration::from_secs(60));
    }
}
