//! Protocol adapter configuration
//!
//! Schema-key extraction is the only adapter behavior that needs
//! configuration: the pixel adapter carries a single fixed key, the webhook
//! adapter maps request paths to keys. The JSON protocols carry their keys
//! in-band.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Settings for all protocol adapters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdaptersConfig {
    /// Pixel adapter
    pub pixel: PixelAdapterConfig,

    /// Webhook adapter
    pub webhook: WebhookAdapterConfig,
}

/// Pixel adapter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PixelAdapterConfig {
    /// Whether the adapter routes are mounted
    pub enabled: bool,

    /// Schema key stamped on every pixel envelope
    pub schema_key: String,
}

impl Default for PixelAdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schema_key: String::new(),
        }
    }
}

/// Webhook adapter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookAdapterConfig {
    /// Whether the adapter routes are mounted
    pub enabled: bool,

    /// Request path (relative, no leading slash) to schema key
    pub mappings: BTreeMap<String, String>,
}

impl Default for WebhookAdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mappings: BTreeMap::new(),
        }
    }
}

impl WebhookAdapterConfig {
    /// Schema key for a webhook path, empty when unmapped
    ///
    /// Unmapped paths still produce envelopes; the annotator marks them
    /// invalid with a missing-schema-key verdict.
    pub fn schema_key_for(&self, path: &str) -> &str {
        self.mappings
            .get(path.trim_start_matches('/'))
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_mapping_lookup() {
        let config: WebhookAdapterConfig = toml::from_str(
            r#"
mappings = { "orders/created" = "com.shop/order_created/jsonschema/1-0-0" }
"#,
        )
        .unwrap();

        assert_eq!(
            config.schema_key_for("orders/created"),
            "com.shop/order_created/jsonschema/1-0-0"
        );
        assert_eq!(
            config.schema_key_for("/orders/created"),
            "com.shop/order_created/jsonschema/1-0-0"
        );
        assert_eq!(config.schema_key_for("unmapped/path"), "");
    }

    #[test]
    fn test_adapters_enabled_by_default() {
        let config = AdaptersConfig::default();
        assert!(config.pixel.enabled);
        assert!(config.webhook.enabled);
    }
}
