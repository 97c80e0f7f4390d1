//! The data type migrator strategy.

use thiserror::Error;

use super::grid::GridElementRegistry;
use super::registry::MigratorRegistry;
use crate::content::{ContentRepository, FieldTypeConfig, FieldTypeDefinition, FieldTypeRef, StorageKind};
use crate::error::RepositoryError;
use crate::transform::{PropertyMigration, TransformError};

/// Errors raised by a data type migrator.
#[derive(Debug, Error)]
pub enum MigratorError {
    /// The definition's configuration cannot be migrated.
    #[error("invalid configuration for {editor_alias}: {reason}")]
    InvalidConfig {
        /// Editor alias of the definition.
        editor_alias: String,
        /// What is wrong.
        reason: String,
    },

    /// A repository lookup failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Building a transform failed.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// What a migrator may consult while planning.
#[derive(Clone, Copy)]
pub struct MigratorContext<'a> {
    /// Host repository.
    pub repository: &'a dyn ContentRepository,
    /// Registry used to resolve nested field types.
    pub migrators: &'a MigratorRegistry,
    /// Registry of grid control migrators.
    pub grid_migrators: &'a GridElementRegistry,
    /// Keep values that are neither ids nor references.
    pub retain_invalid_data: bool,
}

/// Decides how one kind of field type definition is migrated.
///
/// Only [`property_migration`](DataTypeMigrator::property_migration) is
/// required; the rest default to "keep as is".
pub trait DataTypeMigrator: Send + Sync {
    /// Whether definitions handled by this migrator need migrating at all.
    fn needs_migration(
        &self,
        _definition: &FieldTypeDefinition,
        _ctx: &MigratorContext<'_>,
    ) -> Result<bool, MigratorError> {
        Ok(true)
    }

    /// Editor alias after migration.
    fn new_editor_alias(&self, definition: &FieldTypeDefinition) -> Result<String, MigratorError> {
        Ok(definition.editor_alias.clone())
    }

    /// Storage kind after migration.
    fn new_storage(&self, definition: &FieldTypeDefinition) -> Result<StorageKind, MigratorError> {
        Ok(definition.storage)
    }

    /// Configuration after migration.
    fn new_config(&self, definition: &FieldTypeDefinition) -> Result<FieldTypeConfig, MigratorError> {
        Ok(definition.config.clone())
    }

    /// Migration applied to content fields backed by this definition.
    fn property_migration(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
    ) -> Result<Option<PropertyMigration>, MigratorError>;
}

/// Content migration for a field type used inside another editor's value.
///
/// `None` when the field type is unknown, has no migrator, needs no
/// migration, or is the enclosing editor itself.
pub fn nested_migration(
    field_type: FieldTypeRef,
    enclosing_alias: &str,
    ctx: &MigratorContext<'_>,
) -> Result<Option<PropertyMigration>, MigratorError> {
    let Some(definition) = ctx.repository.field_type(field_type)? else {
        return Ok(None);
    };
    if definition.editor_alias.eq_ignore_ascii_case(enclosing_alias) {
        return Ok(None);
    }
    let Some(migrator) = ctx.migrators.resolve(&definition.editor_alias) else {
        return Ok(None);
    };
    if !migrator.needs_migration(&definition, ctx)? {
        return Ok(None);
    }
    migrator.property_migration(&definition, ctx)
}
