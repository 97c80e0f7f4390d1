//! Migrators that re-encode a whole field value with one transform.

use std::sync::Arc;

use super::migrator::{DataTypeMigrator, MigratorContext, MigratorError};
use crate::content::FieldTypeDefinition;
use crate::transform::{MapLocationTransform, PickedKeysTransform, PropertyMigration};

/// Applies one migration to the raw field value. Storage and
/// configuration are kept; only the editor alias may change.
#[derive(Debug, Clone)]
pub struct RecodingMigrator {
    new_alias: Option<&'static str>,
    migration: PropertyMigration,
}

impl RecodingMigrator {
    /// Create a migrator that keeps the editor alias.
    pub fn new(migration: PropertyMigration) -> Self {
        Self {
            new_alias: None,
            migration,
        }
    }

    /// Move definitions to another editor alias.
    pub fn with_new_alias(mut self, alias: &'static str) -> Self {
        self.new_alias = Some(alias);
        self
    }
}

impl DataTypeMigrator for RecodingMigrator {
    fn new_editor_alias(&self, definition: &FieldTypeDefinition) -> Result<String, MigratorError> {
        Ok(self
            .new_alias
            .map_or_else(|| definition.editor_alias.clone(), str::to_string))
    }

    fn property_migration(
        &self,
        _definition: &FieldTypeDefinition,
        _ctx: &MigratorContext<'_>,
    ) -> Result<Option<PropertyMigration>, MigratorError> {
        Ok(Some(self.migration.clone()))
    }
}

/// `AngularGoogleMaps`: `lat,lng,zoom` text moved to the GMaps editor.
/// Cannot be downgraded.
pub fn google_maps() -> RecodingMigrator {
    RecodingMigrator::new(PropertyMigration::upgrade_only(Arc::new(MapLocationTransform)))
        .with_new_alias("Our.Umbraco.GMaps")
}

/// nuPickers list pickers: picked `{key, label}` items reduced to their
/// keys. Cannot be downgraded.
pub fn nu_picker() -> RecodingMigrator {
    RecodingMigrator::new(PropertyMigration::upgrade_only(Arc::new(PickedKeysTransform)))
}
