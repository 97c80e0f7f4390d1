//! Shared-secret gate for running migrations on demand.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use super::applier::{ApplyReport, MigrationApplier};
use crate::config::MigrationSettings;

/// Reasons a manual run is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    /// No trigger key is configured, so manual runs are disabled.
    #[error("manual migration trigger is not configured")]
    NotConfigured,

    /// The presented key does not match.
    #[error("invalid manual trigger key")]
    InvalidKey,
}

/// Runs the applier when presented with the configured key.
///
/// Only a digest of the key is held. Comparison takes the same time
/// wherever the presented key differs.
#[derive(Clone)]
pub struct ManualTrigger {
    key_digest: Option<blake3::Hash>,
}

impl ManualTrigger {
    /// Trigger accepting `key`. `None` or a blank key disables it.
    pub fn new(key: Option<&str>) -> Self {
        let key_digest = key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| blake3::hash(k.as_bytes()));
        Self { key_digest }
    }

    /// Trigger configured from settings.
    pub fn from_settings(settings: &MigrationSettings) -> Self {
        Self::new(settings.manual_trigger_key.as_deref())
    }

    /// Whether a key is configured.
    pub fn is_enabled(&self) -> bool {
        self.key_digest.is_some()
    }

    /// Check a presented key.
    pub fn authorize(&self, presented: &str) -> Result<(), TriggerError> {
        let Some(expected) = &self.key_digest else {
            warn!("Manual migration requested but no trigger key is configured");
            return Err(TriggerError::NotConfigured);
        };
        // blake3::Hash equality is constant time.
        if blake3::hash(presented.trim().as_bytes()) != *expected {
            warn!("Manual migration requested with an invalid key");
            return Err(TriggerError::InvalidKey);
        }
        Ok(())
    }

    /// Run every due migration if `presented` matches.
    pub fn trigger(&self, presented: &str, applier: &MigrationApplier<'_>) -> Result<ApplyReport, TriggerError> {
        self.authorize(presented)?;
        info!("Manual migration run started");
        Ok(applier.apply())
    }
}

impl fmt::Debug for ManualTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTrigger")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryRepository;
    use crate::datatype::MigratorRegistry;
    use crate::migration::applier::ResolverRegistry;
    use crate::migration::store::MemoryVersionStore;

    #[test]
    fn test_authorize() {
        let trigger = ManualTrigger::new(Some("s3cret"));
        assert!(trigger.authorize("s3cret").is_ok());
        assert_eq!(trigger.authorize("s3cre"), Err(TriggerError::InvalidKey));
        assert_eq!(trigger.authorize(""), Err(TriggerError::InvalidKey));
    }

    #[test]
    fn test_disabled_without_key() {
        for trigger in [ManualTrigger::new(None), ManualTrigger::new(Some("  "))] {
            assert!(!trigger.is_enabled());
            assert_eq!(trigger.authorize("anything"), Err(TriggerError::NotConfigured));
        }
    }

    #[test]
    fn test_debug_hides_key() {
        let trigger = ManualTrigger::new(Some("s3cret"));
        assert!(!format!("{trigger:?}").contains("s3cret"));
    }

    #[test]
    fn test_trigger_runs_applier() {
        let settings = MigrationSettings::default().with_manual_trigger_key("k");
        let trigger = ManualTrigger::from_settings(&settings);
        let repo = InMemoryRepository::new();
        let store = MemoryVersionStore::new();
        let resolvers = ResolverRegistry::new();
        let migrators = MigratorRegistry::new();
        let applier = MigrationApplier::new(&repo, &repo, &store, &resolvers, &migrators).with_settings(settings);

        assert!(trigger.trigger("wrong", &applier).is_err());
        assert_eq!(trigger.trigger("k", &applier).unwrap(), ApplyReport::default());
    }
}
