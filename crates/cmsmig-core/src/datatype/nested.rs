//! Nested content migration.
//!
//! A nested content value is a JSON array of elements. Each element names
//! its schema type in `ncContentTypeAlias` and carries one entry per field
//! of that type. Fields whose own field type has a migrator are rewritten
//! in place, including nested content inside nested content.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::migrator::{nested_migration, DataTypeMigrator, MigratorContext, MigratorError};
use crate::content::{BaseType, FieldTypeDefinition, FieldTypeRef, SchemaGraph, SchemaType, StorageKind};
use crate::transform::{
    pointer_child, JsonExtractor, JsonLeaf, JsonTransform, LeafEncoding, PropertyMigration,
};

/// Editor alias of the community nested content editor.
pub const LEGACY_NESTED_CONTENT_ALIAS: &str = "Our.Umbraco.NestedContent";

/// Editor alias nested content moves to.
pub const NESTED_CONTENT_ALIAS: &str = "Umbraco.NestedContent";

/// Element key naming the element's schema type.
const ELEMENT_TYPE_KEY: &str = "ncContentTypeAlias";

/// Element keys that are not fields.
const RESERVED_KEYS: [&str; 3] = ["name", ELEMENT_TYPE_KEY, "key"];

/// Lowercase element type alias to lowercase field alias to migration.
type ElementMigrations = HashMap<String, HashMap<String, PropertyMigration>>;

#[derive(Debug, Deserialize)]
struct ElementTypeConfig {
    #[serde(rename = "ncAlias")]
    alias: String,
}

fn is_nested_content(editor_alias: &str) -> bool {
    editor_alias.eq_ignore_ascii_case(LEGACY_NESTED_CONTENT_ALIAS)
        || editor_alias.eq_ignore_ascii_case(NESTED_CONTENT_ALIAS)
}

/// Points at every migratable field of every element.
#[derive(Debug, Clone)]
struct NestedElementExtractor {
    elements: ElementMigrations,
}

impl JsonExtractor for NestedElementExtractor {
    fn leaves(&self, tree: &Value) -> Vec<JsonLeaf> {
        let Value::Array(items) = tree else {
            return Vec::new();
        };

        let mut leaves = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            let Some(element) = item.as_object() else {
                continue;
            };
            let Some(fields) = element
                .get(ELEMENT_TYPE_KEY)
                .and_then(Value::as_str)
                .and_then(|alias| self.elements.get(&alias.to_ascii_lowercase()))
            else {
                continue;
            };

            for (key, value) in element {
                if value.is_null() || RESERVED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let Some(migration) = fields.get(&key.to_ascii_lowercase()) else {
                    continue;
                };
                leaves.push(JsonLeaf {
                    pointer: pointer_child(&pointer_child("", idx), key),
                    encoding: if value.is_string() {
                        LeafEncoding::Text
                    } else {
                        LeafEncoding::Json
                    },
                    migration: migration.clone(),
                });
            }
        }
        leaves
    }
}

/// Moves `Our.Umbraco.NestedContent` definitions to the core editor and
/// migrates the fields inside each element.
///
/// Element types come from the `contentTypes` pre-value; when it lists
/// none, every document schema type may appear as an element.
#[derive(Debug, Clone, Default)]
pub struct NestedContentMigrator;

impl NestedContentMigrator {
    /// Create the migrator.
    pub fn new() -> Self {
        Self
    }

    fn element_aliases(definition: &FieldTypeDefinition) -> Result<Vec<String>, MigratorError> {
        let Some(raw) = definition
            .config
            .pre_value("contentTypes")
            .filter(|v| !v.trim().is_empty())
        else {
            return Ok(Vec::new());
        };
        let types: Vec<ElementTypeConfig> =
            serde_json::from_str(raw).map_err(|e| MigratorError::InvalidConfig {
                editor_alias: definition.editor_alias.clone(),
                reason: e.to_string(),
            })?;
        Ok(types.into_iter().map(|t| t.alias).collect())
    }

    /// Migration for one nested content definition. `visiting` holds the
    /// ids of enclosing nested content definitions.
    fn migration_for(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
        visiting: &mut Vec<i64>,
    ) -> Result<Option<PropertyMigration>, MigratorError> {
        visiting.push(definition.id);
        let elements = self.element_migrations(definition, ctx, visiting);
        visiting.pop();

        let elements = elements?;
        if elements.is_empty() {
            return Ok(None);
        }
        let extractors: Vec<Arc<dyn JsonExtractor>> = vec![Arc::new(NestedElementExtractor { elements })];
        Ok(Some(JsonTransform::migration(extractors)))
    }

    fn element_migrations(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
        visiting: &mut Vec<i64>,
    ) -> Result<ElementMigrations, MigratorError> {
        let wanted = Self::element_aliases(definition)?;
        let schemas = ctx.repository.schema_types(BaseType::Document)?;
        let graph = SchemaGraph::build(&schemas);
        let by_id: HashMap<i64, &SchemaType> = schemas.iter().map(|s| (s.id, s)).collect();

        let mut elements = ElementMigrations::new();
        for schema in &schemas {
            if !wanted.is_empty() && !wanted.iter().any(|a| a.eq_ignore_ascii_case(&schema.alias)) {
                continue;
            }

            let mut fields = HashMap::new();
            for id in graph.ancestors_of(schema.id) {
                let Some(owner) = by_id.get(&id) else {
                    continue;
                };
                for field in &owner.fields {
                    let alias = field.alias.to_ascii_lowercase();
                    if fields.contains_key(&alias) {
                        continue;
                    }
                    if let Some(migration) = self.field_migration(field.field_type_id, ctx, visiting)? {
                        fields.insert(alias, migration);
                    }
                }
            }

            if !fields.is_empty() {
                elements.insert(schema.alias.to_ascii_lowercase(), fields);
            }
        }
        Ok(elements)
    }

    fn field_migration(
        &self,
        field_type_id: i64,
        ctx: &MigratorContext<'_>,
        visiting: &mut Vec<i64>,
    ) -> Result<Option<PropertyMigration>, MigratorError> {
        let reference = FieldTypeRef::Id(field_type_id);
        let Some(definition) = ctx.repository.field_type(reference)? else {
            return Ok(None);
        };
        if !is_nested_content(&definition.editor_alias) {
            return nested_migration(reference, LEGACY_NESTED_CONTENT_ALIAS, ctx);
        }
        if visiting.contains(&definition.id) {
            debug!(field_type = %definition.name, "Nested content contains itself, not descending again");
            return Ok(None);
        }
        self.migration_for(&definition, ctx, visiting)
    }
}

impl DataTypeMigrator for NestedContentMigrator {
    fn new_editor_alias(&self, _definition: &FieldTypeDefinition) -> Result<String, MigratorError> {
        Ok(NESTED_CONTENT_ALIAS.to_string())
    }

    fn new_storage(&self, _definition: &FieldTypeDefinition) -> Result<StorageKind, MigratorError> {
        Ok(StorageKind::Ntext)
    }

    fn property_migration(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
    ) -> Result<Option<PropertyMigration>, MigratorError> {
        self.migration_for(definition, ctx, &mut Vec::new())
    }
}
