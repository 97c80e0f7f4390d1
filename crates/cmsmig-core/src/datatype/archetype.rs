//! Archetype migration.
//!
//! An Archetype value is `{ fieldsets: [{ properties: [{ alias, value }] }] }`.
//! The definition's `archetypeConfig` pre-value says which field type backs
//! each property alias.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::migrator::{nested_migration, DataTypeMigrator, MigratorContext, MigratorError};
use crate::content::{FieldTypeDefinition, FieldTypeRef};
use crate::transform::{
    pointer_child, JsonExtractor, JsonLeaf, JsonTransform, LeafEncoding, PropertyMigration,
};

/// Editor alias of the Archetype editor.
pub const ARCHETYPE_ALIAS: &str = "Imulus.Archetype";

#[derive(Debug, Default, Deserialize)]
struct ArchetypeConfig {
    #[serde(default)]
    fieldsets: Vec<FieldsetConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldsetConfig {
    #[serde(default)]
    properties: Vec<PropertyConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyConfig {
    #[serde(default)]
    alias: String,
    #[serde(default)]
    data_type_guid: Option<String>,
}

fn indexed<'v>(value: &'v Value, key: &str) -> impl Iterator<Item = (usize, &'v Value)> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
}

/// Points at the `value` of every fieldset property with a known alias.
#[derive(Debug, Clone)]
struct FieldsetPropertyExtractor {
    migrations: BTreeMap<String, PropertyMigration>,
}

impl JsonExtractor for FieldsetPropertyExtractor {
    fn leaves(&self, tree: &Value) -> Vec<JsonLeaf> {
        let mut leaves = Vec::new();
        for (f, fieldset) in indexed(tree, "fieldsets") {
            for (p, property) in indexed(fieldset, "properties") {
                let Some(migration) = property
                    .get("alias")
                    .and_then(Value::as_str)
                    .and_then(|alias| self.migrations.get(alias))
                else {
                    continue;
                };
                if property.get("value").is_none() {
                    continue;
                }
                let base = pointer_child(&format!("/fieldsets/{f}/properties"), p);
                leaves.push(JsonLeaf {
                    pointer: pointer_child(&base, "value"),
                    encoding: LeafEncoding::Text,
                    migration: migration.clone(),
                });
            }
        }
        leaves
    }
}

/// Migrates the properties inside Archetype fieldsets. The definition
/// itself is kept.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeMigrator;

impl ArchetypeMigrator {
    /// Create the migrator.
    pub fn new() -> Self {
        Self
    }

    fn migrations(
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
    ) -> Result<BTreeMap<String, PropertyMigration>, MigratorError> {
        let Some(raw) = definition
            .config
            .pre_value("archetypeConfig")
            .filter(|v| !v.trim().is_empty())
        else {
            return Ok(BTreeMap::new());
        };
        let config: ArchetypeConfig =
            serde_json::from_str(raw).map_err(|e| MigratorError::InvalidConfig {
                editor_alias: definition.editor_alias.clone(),
                reason: e.to_string(),
            })?;

        let mut migrations = BTreeMap::new();
        let properties = config.fieldsets.iter().flat_map(|f| f.properties.iter());
        for property in properties {
            if property.alias.trim().is_empty() || migrations.contains_key(&property.alias) {
                continue;
            }
            let Some(reference) = property.data_type_guid.as_deref().and_then(FieldTypeRef::parse) else {
                continue;
            };
            if let Some(migration) = nested_migration(reference, &definition.editor_alias, ctx)? {
                migrations.insert(property.alias.clone(), migration);
            }
        }
        Ok(migrations)
    }
}

impl DataTypeMigrator for ArchetypeMigrator {
    fn needs_migration(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
    ) -> Result<bool, MigratorError> {
        Ok(!Self::migrations(definition, ctx)?.is_empty())
    }

    fn property_migration(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
    ) -> Result<Option<PropertyMigration>, MigratorError> {
        let migrations = Self::migrations(definition, ctx)?;
        if migrations.is_empty() {
            return Ok(None);
        }
        let extractors: Vec<Arc<dyn JsonExtractor>> =
            vec![Arc::new(FieldsetPropertyExtractor { migrations })];
        Ok(Some(JsonTransform::migration(extractors)))
    }
}
