//! Migration configuration.
//!
//! Settings are read from JSON. Resolver entries are parsed one at a time so
//! a malformed entry does not keep the others from loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Name the host platform records its own migrations under.
pub const DEFAULT_PLATFORM_PRODUCT: &str = "umbraco";

/// Setting key holding the comma-separated list of monitored products.
pub const MONITORED_PRODUCT_NAMES: &str = "MonitoredProductNames";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for the settings shape.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A required setting is absent.
    #[error("missing setting '{key}'")]
    MissingSetting {
        /// Setting key.
        key: String,
    },
}

/// Free-form key/value settings of one resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolverSettings(BTreeMap<String, String>);

impl ResolverSettings {
    /// Create empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a value. Keys match case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a value that must be present.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingSetting { key: key.to_string() })
    }

    /// Monitored product names: split on commas, trimmed, blanks removed.
    ///
    /// `None` when the setting is absent.
    pub fn monitored_product_names(&self) -> Option<Vec<String>> {
        self.get(MONITORED_PRODUCT_NAMES).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

/// One configured resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Display name.
    pub name: String,
    /// Registered resolver type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Resolver settings.
    #[serde(default)]
    pub settings: ResolverSettings,
}

impl ResolverConfig {
    /// Create a resolver entry.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            settings: ResolverSettings::default(),
        }
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Top-level migration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Configured resolvers, in run order.
    #[serde(deserialize_with = "lenient_resolvers")]
    pub resolvers: Vec<ResolverConfig>,
    /// Shared secret of the manual trigger. Unset disables the trigger.
    pub manual_trigger_key: Option<String>,
    /// Apply migrations when the host starts.
    pub run_at_startup: bool,
    /// Keep tokens that are neither ids nor references.
    pub retain_invalid_data: bool,
    /// Forward save events to host handlers.
    pub raise_events: bool,
    /// Product name reserved for the host's own migrations.
    pub platform_product_name: String,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            resolvers: Vec::new(),
            manual_trigger_key: None,
            run_at_startup: true,
            retain_invalid_data: false,
            raise_events: false,
            platform_product_name: DEFAULT_PLATFORM_PRODUCT.to_string(),
        }
    }
}

impl MigrationSettings {
    /// Parse settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Add a resolver.
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Set the manual trigger key.
    pub fn with_manual_trigger_key(mut self, key: impl Into<String>) -> Self {
        self.manual_trigger_key = Some(key.into());
        self
    }

    /// Set whether migrations run at startup.
    pub fn with_run_at_startup(mut self, run: bool) -> Self {
        self.run_at_startup = run;
        self
    }

    /// Set whether invalid tokens are kept.
    pub fn with_retain_invalid_data(mut self, retain: bool) -> Self {
        self.retain_invalid_data = retain;
        self
    }

    /// Set whether save events are raised.
    pub fn with_raise_events(mut self, raise_events: bool) -> Self {
        self.raise_events = raise_events;
        self
    }

    /// Set the reserved platform product name.
    pub fn with_platform_product_name(mut self, name: impl Into<String>) -> Self {
        self.platform_product_name = name.into();
        self
    }
}

fn lenient_resolvers<'de, D>(deserializer: D) -> Result<Vec<ResolverConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut resolvers = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<ResolverConfig>(value) {
            Ok(resolver) => resolvers.push(resolver),
            Err(e) => warn!(index, error = %e, "Skipping malformed resolver configuration"),
        }
    }
    Ok(resolvers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MigrationSettings::from_json_str("{}").unwrap();
        assert!(settings.run_at_startup);
        assert!(!settings.retain_invalid_data);
        assert_eq!(settings.platform_product_name, "umbraco");
        assert!(settings.manual_trigger_key.is_none());
        assert_eq!(settings, MigrationSettings::default());
    }

    #[test]
    fn test_malformed_resolver_is_skipped() {
        let settings = MigrationSettings::from_json_str(
            r#"{
                "resolvers": [
                    {"name": "products", "type": "ProductMigrationResolver",
                     "settings": {"MonitoredProductNames": "shop, blog"}},
                    {"name": "broken"},
                    {"name": "other", "type": "Custom"}
                ],
                "run_at_startup": false
            }"#,
        )
        .unwrap();

        assert!(!settings.run_at_startup);
        let names: Vec<_> = settings.resolvers.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["products", "other"]);
        assert!(settings.resolvers[1].settings.get("anything").is_none());
    }

    #[test]
    fn test_monitored_product_names() {
        let settings = ResolverSettings::new().with("monitoredproductnames", " shop ,, Blog,  ");
        assert_eq!(settings.monitored_product_names().unwrap(), vec!["shop", "Blog"]);
        assert!(ResolverSettings::new().monitored_product_names().is_none());
        assert!(matches!(
            ResolverSettings::new().require("x"),
            Err(ConfigError::MissingSetting { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MigrationSettings::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
