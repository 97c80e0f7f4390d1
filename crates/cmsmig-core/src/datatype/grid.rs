//! Grid layout editor migration.
//!
//! A grid value is a tree of sections, rows, areas and controls. Each
//! control names the editor that produced it, and a [`GridElementMigrator`]
//! registered for that editor alias points at the migratable leaves inside
//! the control's value.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::migrator::{nested_migration, DataTypeMigrator, MigratorContext, MigratorError};
use crate::content::{BaseType, FieldTypeConfig, FieldTypeDefinition, FieldTypeRef, GridConfig};
use crate::transform::{
    pointer_child, JsonExtractor, JsonLeaf, JsonTransform, LeafEncoding, PropertyMigration,
};

/// Finds migratable leaves inside one grid control's value.
pub trait GridElementMigrator: Send + Sync {
    /// Leaves under `value`, which lives at `base` in the whole grid tree.
    fn leaves(&self, base: &str, value: &Value) -> Vec<JsonLeaf>;
}

/// Builds a grid element migrator.
pub type GridElementFactory = Arc<dyn Fn() -> Arc<dyn GridElementMigrator> + Send + Sync>;

/// A value that is one object or an array of objects, with their pointers.
fn objects_at<'v>(base: &str, value: &'v Value) -> Vec<(String, &'v Map<String, Value>)> {
    match value {
        Value::Object(obj) => vec![(base.to_string(), obj)],
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| item.as_object().map(|obj| (pointer_child(base, idx), obj)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Control values shaped as `{ alias: { value: ... } }`, one entry per
/// nested property editor.
#[derive(Debug, Clone, Default)]
pub struct GenericEditorMigrator {
    migrations: BTreeMap<String, PropertyMigration>,
}

impl GenericEditorMigrator {
    /// Create a migrator from property alias to migration.
    pub fn new(migrations: BTreeMap<String, PropertyMigration>) -> Self {
        Self { migrations }
    }
}

impl GridElementMigrator for GenericEditorMigrator {
    fn leaves(&self, base: &str, value: &Value) -> Vec<JsonLeaf> {
        let mut leaves = Vec::new();
        for (pointer, obj) in objects_at(base, value) {
            for (alias, migration) in &self.migrations {
                if obj.get(alias).and_then(|entry| entry.get("value")).is_none() {
                    continue;
                }
                leaves.push(JsonLeaf {
                    pointer: pointer_child(&pointer_child(&pointer, alias), "value"),
                    encoding: LeafEncoding::Text,
                    migration: migration.clone(),
                });
            }
        }
        leaves
    }
}

/// Control values embedding content of a schema type, shaped as
/// `{ value: { alias: ... } }`.
#[derive(Debug, Clone, Default)]
pub struct DocTypeMigrator {
    migrations: BTreeMap<String, PropertyMigration>,
}

impl DocTypeMigrator {
    /// Create a migrator from property alias to migration.
    pub fn new(migrations: BTreeMap<String, PropertyMigration>) -> Self {
        Self { migrations }
    }
}

impl GridElementMigrator for DocTypeMigrator {
    fn leaves(&self, base: &str, value: &Value) -> Vec<JsonLeaf> {
        let mut leaves = Vec::new();
        for (pointer, obj) in objects_at(base, value) {
            let Some(inner) = obj.get("value") else {
                continue;
            };
            for (inner_pointer, properties) in objects_at(&pointer_child(&pointer, "value"), inner) {
                for (alias, migration) in &self.migrations {
                    if !properties.contains_key(alias) {
                        continue;
                    }
                    leaves.push(JsonLeaf {
                        pointer: pointer_child(&inner_pointer, alias),
                        encoding: LeafEncoding::Text,
                        migration: migration.clone(),
                    });
                }
            }
        }
        leaves
    }
}

/// Resolves grid element migrators by control editor alias, ignoring ASCII
/// case. Resolutions are memoized until the alias is registered again.
#[derive(Default)]
pub struct GridElementRegistry {
    factories: RwLock<HashMap<String, GridElementFactory>>,
    resolved: Mutex<HashMap<String, Option<Arc<dyn GridElementMigrator>>>>,
}

impl GridElementRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. Returns `false` if the alias was taken and
    /// `overwrite` is not set.
    pub fn register<F>(&self, control_alias: &str, factory: F, overwrite: bool) -> bool
    where
        F: Fn() -> Arc<dyn GridElementMigrator> + Send + Sync + 'static,
    {
        let key = control_alias.to_ascii_lowercase();
        {
            let mut factories = self.factories.write();
            if !overwrite && factories.contains_key(&key) {
                return false;
            }
            factories.insert(key.clone(), Arc::new(factory));
        }
        self.resolved.lock().remove(&key);
        true
    }

    /// Register a shared instance.
    pub fn register_instance(
        &self,
        control_alias: &str,
        migrator: Arc<dyn GridElementMigrator>,
        overwrite: bool,
    ) -> bool {
        self.register(control_alias, move || Arc::clone(&migrator), overwrite)
    }

    /// Resolve the migrator for a control editor alias.
    pub fn resolve(&self, control_alias: &str) -> Option<Arc<dyn GridElementMigrator>> {
        let key = control_alias.to_ascii_lowercase();
        let mut resolved = self.resolved.lock();
        if let Some(hit) = resolved.get(&key) {
            return hit.clone();
        }
        let migrator = self.factories.read().get(&key).map(|factory| factory());
        resolved.insert(key, migrator.clone());
        migrator
    }
}

/// Walks `sections/rows/areas/controls` and hands each control value to the
/// migrator registered for its editor alias.
struct GridControlExtractor {
    migrators: HashMap<String, Arc<dyn GridElementMigrator>>,
}

fn indexed<'v>(value: &'v Value, key: &str) -> impl Iterator<Item = (usize, &'v Value)> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
}

impl JsonExtractor for GridControlExtractor {
    fn leaves(&self, tree: &Value) -> Vec<JsonLeaf> {
        let mut leaves = Vec::new();
        for (s, section) in indexed(tree, "sections") {
            for (r, row) in indexed(section, "rows") {
                for (a, area) in indexed(row, "areas") {
                    for (c, control) in indexed(area, "controls") {
                        let Some(value) = control.get("value").filter(|v| !v.is_null()) else {
                            continue;
                        };
                        let Some(editor) = control
                            .get("editor")
                            .and_then(|e| e.get("alias"))
                            .and_then(Value::as_str)
                            .filter(|a| !a.trim().is_empty())
                        else {
                            continue;
                        };
                        let Some(migrator) = self.migrators.get(&editor.to_ascii_lowercase()) else {
                            continue;
                        };
                        let base = format!("/sections/{s}/rows/{r}/areas/{a}/controls/{c}/value");
                        leaves.extend(migrator.leaves(&base, value));
                    }
                }
            }
        }
        leaves
    }
}

/// Migrates grid layout editors by delegating to grid element migrators.
///
/// Before planning, every grid editor known to the repository that nests
/// migratable property editors, or embeds schema types with migratable
/// fields, gets a migrator registered for it. Existing registrations win.
#[derive(Debug, Clone, Default)]
pub struct GridMigrator;

impl GridMigrator {
    /// Create the migrator.
    pub fn new() -> Self {
        Self
    }

    fn grid_config(definition: &FieldTypeDefinition) -> Result<Option<GridConfig>, MigratorError> {
        match &definition.config {
            FieldTypeConfig::Grid(config) => Ok(Some(config.clone())),
            FieldTypeConfig::PreValues(_) => {
                let Some(items) = definition
                    .config
                    .pre_value("items")
                    .filter(|v| !v.trim().is_empty())
                else {
                    return Ok(None);
                };
                serde_json::from_str(items)
                    .map(Some)
                    .map_err(|e| MigratorError::InvalidConfig {
                        editor_alias: definition.editor_alias.clone(),
                        reason: e.to_string(),
                    })
            }
            _ => Ok(None),
        }
    }

    fn nested_migrations<'p>(
        &self,
        properties: impl Iterator<Item = (&'p str, &'p str)>,
        grid_alias: &str,
        ctx: &MigratorContext<'_>,
    ) -> Result<BTreeMap<String, PropertyMigration>, MigratorError> {
        let mut migrations = BTreeMap::new();
        for (field_type, alias) in properties {
            if field_type.trim().is_empty() || alias.trim().is_empty() {
                continue;
            }
            let Some(reference) = FieldTypeRef::parse(field_type) else {
                continue;
            };
            if let Some(migration) = nested_migration(reference, grid_alias, ctx)? {
                migrations.insert(alias.to_string(), migration);
            }
        }
        Ok(migrations)
    }

    /// Register element migrators for the repository's grid editors and
    /// return every editor alias.
    fn register_editors(
        &self,
        grid_alias: &str,
        ctx: &MigratorContext<'_>,
    ) -> Result<Vec<String>, MigratorError> {
        let editors = ctx.repository.grid_editors()?;
        let mut aliases = Vec::with_capacity(editors.len());

        for editor in editors {
            if editor.alias.trim().is_empty() {
                continue;
            }
            aliases.push(editor.alias.clone());

            let nested = editor
                .nested_editors
                .iter()
                .map(|(field_type, alias)| (field_type.as_str(), alias.as_str()));
            let migrations = self.nested_migrations(nested, grid_alias, ctx)?;
            if !migrations.is_empty() {
                let migrator: Arc<dyn GridElementMigrator> = Arc::new(GenericEditorMigrator::new(migrations));
                ctx.grid_migrators.register_instance(&editor.alias, migrator, false);
            }

            for schema_alias in &editor.allowed_schema_types {
                let Some(schema) = ctx.repository.schema_type(BaseType::Document, schema_alias)? else {
                    debug!(editor = %editor.alias, schema = %schema_alias, "Embedded schema type not found");
                    continue;
                };
                let fields: Vec<(String, String)> = schema
                    .fields
                    .iter()
                    .map(|f| (f.field_type_id.to_string(), f.alias.clone()))
                    .collect();
                let migrations = self.nested_migrations(
                    fields.iter().map(|(id, alias)| (id.as_str(), alias.as_str())),
                    grid_alias,
                    ctx,
                )?;
                if !migrations.is_empty() {
                    let migrator: Arc<dyn GridElementMigrator> = Arc::new(DocTypeMigrator::new(migrations));
                    ctx.grid_migrators.register_instance(&editor.alias, migrator, false);
                }
            }
        }

        Ok(aliases)
    }

    fn extractor(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
    ) -> Result<Option<GridControlExtractor>, MigratorError> {
        let Some(config) = Self::grid_config(definition)? else {
            return Ok(None);
        };
        if config.layouts.is_empty() {
            return Ok(None);
        }

        let all_aliases = self.register_editors(&definition.editor_alias, ctx)?;
        let mut migrators = HashMap::new();
        for area in config.layouts.iter().flat_map(|l| l.areas.iter()) {
            let allowed = if area.allow_all {
                all_aliases.as_slice()
            } else {
                area.allowed.as_slice()
            };
            for alias in allowed {
                let key = alias.to_ascii_lowercase();
                if migrators.contains_key(&key) {
                    continue;
                }
                if let Some(migrator) = ctx.grid_migrators.resolve(alias) {
                    migrators.insert(key, migrator);
                }
            }
        }

        if migrators.is_empty() {
            return Ok(None);
        }
        Ok(Some(GridControlExtractor { migrators }))
    }
}

impl DataTypeMigrator for GridMigrator {
    fn needs_migration(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
    ) -> Result<bool, MigratorError> {
        Ok(self.extractor(definition, ctx)?.is_some())
    }

    fn property_migration(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
    ) -> Result<Option<PropertyMigration>, MigratorError> {
        let Some(extractor) = self.extractor(definition, ctx)? else {
            warn!(field_type = %definition.name, "Grid has no migratable controls");
            return Ok(None);
        };
        let extractors: Vec<Arc<dyn JsonExtractor>> = vec![Arc::new(extractor)];
        Ok(Some(JsonTransform::migration(extractors)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{
        ContentNode, GridArea, GridEditor, GridLayout, InMemoryRepository, SchemaField, SchemaType,
        StorageKind,
    };
    use crate::datatype::MigratorRegistry;
    use crate::transform::{apply_transform, ReferenceCache, TransformContext};
    use serde_json::json;
    use uuid::Uuid;

    struct Fixture {
        repo: InMemoryRepository,
        migrators: MigratorRegistry,
        grid: GridElementRegistry,
        image_key: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            let repo = InMemoryRepository::new();
            let image_key = Uuid::new_v4();
            repo.add_node(ContentNode::new(2001, image_key, BaseType::Media, 9, "image"));
            repo.add_field_type(FieldTypeDefinition::new(
                30,
                "Image",
                "Umbraco.MediaPicker",
                StorageKind::Integer,
            ));
            repo.add_field_type(FieldTypeDefinition::new(
                31,
                "Text",
                "Umbraco.Textbox",
                StorageKind::Nvarchar,
            ));
            repo.add_schema_type(
                BaseType::Document,
                SchemaType::new(40, "banner")
                    .with_field(SchemaField::new("image", 30))
                    .with_field(SchemaField::new("title", 31)),
            );
            repo.add_grid_editor(GridEditor::new("captionedImage").with_nested_editor("30", "photo"));
            repo.add_grid_editor(GridEditor::new("bannerBlock").with_allowed_schema_type("banner"));
            repo.add_grid_editor(GridEditor::new("headline"));
            Self {
                repo,
                migrators: MigratorRegistry::with_defaults(),
                grid: GridElementRegistry::new(),
                image_key,
            }
        }

        fn ctx(&self) -> MigratorContext<'_> {
            MigratorContext {
                repository: &self.repo,
                migrators: &self.migrators,
                grid_migrators: &self.grid,
                retain_invalid_data: false,
            }
        }
    }

    fn grid_definition(area: GridArea) -> FieldTypeDefinition {
        FieldTypeDefinition::new(50, "Body", "Umbraco.Grid", StorageKind::Ntext).with_config(
            FieldTypeConfig::Grid(GridConfig {
                layouts: vec![GridLayout {
                    name: Some("Full".into()),
                    areas: vec![area],
                }],
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_generic_editor_leaves() {
        let mut migrations = BTreeMap::new();
        migrations.insert(
            "photo".to_string(),
            PropertyMigration::upgrade_only(Arc::new(crate::transform::ReferenceToIdTransform)),
        );
        let migrator = GenericEditorMigrator::new(migrations);
        let value = json!([{"photo": {"value": "1"}}, "skip", {"other": {}}]);
        let leaves = migrator.leaves("/v", &value);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].pointer, "/v/0/photo/value");
    }

    #[test]
    fn test_doc_type_leaves() {
        let mut migrations = BTreeMap::new();
        migrations.insert(
            "image".to_string(),
            PropertyMigration::upgrade_only(Arc::new(crate::transform::ReferenceToIdTransform)),
        );
        let migrator = DocTypeMigrator::new(migrations);
        let value = json!({"value": [{"image": "1"}, {"title": "x"}]});
        let leaves = migrator.leaves("/v", &value);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].pointer, "/v/value/0/image");
    }

    #[test]
    fn test_element_registry_respects_overwrite() {
        let registry = GridElementRegistry::new();
        let first: Arc<dyn GridElementMigrator> = Arc::new(GenericEditorMigrator::default());
        let second: Arc<dyn GridElementMigrator> = Arc::new(DocTypeMigrator::default());
        assert!(registry.register_instance("Quote", first.clone(), false));
        assert!(!registry.register_instance("quote", second.clone(), false));
        assert!(Arc::ptr_eq(&registry.resolve("QUOTE").unwrap(), &first));
        assert!(registry.register_instance("quote", second.clone(), true));
        assert!(Arc::ptr_eq(&registry.resolve("quote").unwrap(), &second));
    }

    #[test]
    fn test_grid_without_migratable_controls() {
        let fx = Fixture::new();
        let definition = grid_definition(GridArea {
            allow_all: false,
            allowed: vec!["headline".into()],
        });
        assert!(!GridMigrator::new().needs_migration(&definition, &fx.ctx()).unwrap());
    }

    #[test]
    fn test_grid_rewrites_nested_and_embedded_values() {
        let fx = Fixture::new();
        let definition = grid_definition(GridArea {
            allow_all: true,
            allowed: Vec::new(),
        });
        let migrator = GridMigrator::new();
        assert!(migrator.needs_migration(&definition, &fx.ctx()).unwrap());
        assert_eq!(migrator.new_editor_alias(&definition).unwrap(), "Umbraco.Grid");
        let migration = migrator.property_migration(&definition, &fx.ctx()).unwrap().unwrap();

        let grid = json!({
            "name": "Full",
            "sections": [{
                "rows": [{
                    "areas": [{
                        "controls": [
                            {"editor": {"alias": "captionedImage"}, "value": {"photo": {"value": "2001"}, "caption": "c"}},
                            {"editor": {"alias": "bannerBlock"}, "value": {"value": {"image": "2001", "title": "t"}}},
                            {"editor": {"alias": "headline"}, "value": "2001"}
                        ]
                    }]
                }]
            }]
        });
        let mut node = ContentNode::new(1, Uuid::new_v4(), BaseType::Document, 60, "article")
            .with_value("body", grid.to_string());

        let cache = ReferenceCache::new();
        let ctx = TransformContext::new(&fx.repo, &cache);
        assert!(apply_transform(migration.upgrader(), &ctx, &mut node, "body").unwrap());

        let out: Value = serde_json::from_str(node.value("body").unwrap()).unwrap();
        let reference = format!("umb://media/{}", fx.image_key.simple());
        let controls = &out["sections"][0]["rows"][0]["areas"][0]["controls"];
        assert_eq!(controls[0]["value"]["photo"]["value"], json!(reference));
        assert_eq!(controls[0]["value"]["caption"], json!("c"));
        assert_eq!(controls[1]["value"]["value"]["image"], json!(reference));
        assert_eq!(controls[1]["value"]["value"]["title"], json!("t"));
        assert_eq!(controls[2]["value"], json!("2001"));

        // Second pass finds nothing left to do.
        assert!(!apply_transform(migration.upgrader(), &ctx, &mut node, "body").unwrap());
    }

    #[test]
    fn test_grid_config_from_pre_values() {
        let items = json!({"layouts": [{"name": "x", "areas": [{"allowed": ["captionedImage"]}]}]});
        let definition = FieldTypeDefinition::new(51, "Body", "Umbraco.Grid", StorageKind::Ntext)
            .with_config(FieldTypeConfig::PreValues(
                [("items".to_string(), Some(items.to_string()))].into_iter().collect(),
            ));
        let fx = Fixture::new();
        assert!(GridMigrator::new().needs_migration(&definition, &fx.ctx()).unwrap());
    }
}
