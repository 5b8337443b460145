//! Schema registry configuration
//!
//! The backend variant is selected by the `type` tag; at most one backend
//! is active per collector.

use std::time::Duration;

use serde::Deserialize;

use crate::{ConfigError, Result};

/// Registry backend selection and cache tuning
///
/// # Example
///
/// ```toml
/// [registry]
/// type = "http"
/// base_url = "https://registry.example.com/schemas"
/// cache_ttl = "5m"
/// purge_enabled = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// Local filesystem registry rooted at a directory
    Fs {
        /// Directory containing schema documents keyed by relative path
        root: String,

        /// Cache entry TTL; absent means entries never expire
        #[serde(default, with = "humantime_serde")]
        cache_ttl: Option<Duration>,

        /// Whether the cache purge ops endpoint is exposed
        #[serde(default = "default_purge")]
        purge_enabled: bool,
    },

    /// Remote HTTP registry
    Http {
        /// Base URL; schema keys are appended as path segments
        base_url: String,

        /// Cache entry TTL; absent means entries never expire
        #[serde(default, with = "humantime_serde")]
        cache_ttl: Option<Duration>,

        /// Whether the cache purge ops endpoint is exposed
        #[serde(default = "default_purge")]
        purge_enabled: bool,
    },

    /// In-memory registry, seeded programmatically (tests, embedded use)
    Memory {
        /// Cache entry TTL; absent means entries never expire
        #[serde(default, with = "humantime_serde")]
        cache_ttl: Option<Duration>,

        /// Whether the cache purge ops endpoint is exposed
        #[serde(default = "default_purge")]
        purge_enabled: bool,
    },
}

fn default_purge() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::Memory {
            cache_ttl: None,
            purge_enabled: true,
        }
    }
}

impl RegistryConfig {
    /// Backend type name, for logs and the route overview
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Fs { .. } => "fs",
            Self::Http { .. } => "http",
            Self::Memory { .. } => "memory",
        }
    }

    /// Cache TTL, if configured
    pub fn cache_ttl(&self) -> Option<Duration> {
        match self {
            Self::Fs { cache_ttl, .. }
            | Self::Http { cache_ttl, .. }
            | Self::Memory { cache_ttl, .. } => *cache_ttl,
        }
    }

    /// Whether the purge endpoint is enabled
    pub fn purge_enabled(&self) -> bool {
        match self {
            Self::Fs { purge_enabled, .. }
            | Self::Http { purge_enabled, .. }
            | Self::Memory { purge_enabled, .. } => *purge_enabled,
        }
    }

    /// Check required backend fields
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Fs { root, .. } if root.is_empty() => {
                Err(ConfigError::missing_field("registry", "fs", "root"))
            }
            Self::Http { base_url, .. } if base_url.is_empty() => {
                Err(ConfigError::missing_field("registry", "http", "base_url"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_memory() {
        let config = RegistryConfig::default();
        assert_eq!(config.type_name(), "memory");
        assert!(config.cache_ttl().is_none());
        assert!(config.purge_enabled());
    }

    #[test]
    fn test_fs_backend() {
        let config: RegistryConfig = toml::from_str(
            r#"
type = "fs"
root = "schemas/"
cache_ttl = "30s"
"#,
        )
        .unwrap();
        assert_eq!(config.type_name(), "fs");
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_requires_base_url() {
        let config = RegistryConfig::Http {
            base_url: String::new(),
            cache_ttl: None,
            purge_enabled: true,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_purge_can_be_disabled() {
        let config: RegistryConfig = toml::from_str(
            r#"
type = "memory"
purge_enabled = false
"#,
        )
        .unwrap();
        assert!(!config.purge_enabled());
    }
}
