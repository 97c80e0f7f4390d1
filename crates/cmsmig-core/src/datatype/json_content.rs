//! Migrators for editors that store a JSON document.

use std::sync::Arc;

use super::migrator::{DataTypeMigrator, MigratorContext, MigratorError};
use crate::content::FieldTypeDefinition;
use crate::transform::{
    ArrayElementExtractor, JsonExtractor, JsonTransform, MultiUrlLinkTransform, PropertyMigration,
    RelatedLinkTransform,
};

/// Migrates a JSON-valued editor by rewriting leaves found by its extractors.
///
/// Storage and configuration are kept; only the editor alias may change.
pub struct JsonContentMigrator {
    new_alias: Option<&'static str>,
    extractors: Vec<Arc<dyn JsonExtractor>>,
}

impl JsonContentMigrator {
    /// Create a migrator that keeps the editor alias.
    pub fn new(extractors: Vec<Arc<dyn JsonExtractor>>) -> Self {
        Self {
            new_alias: None,
            extractors,
        }
    }

    /// Move definitions to another editor alias.
    pub fn with_new_alias(mut self, alias: &'static str) -> Self {
        self.new_alias = Some(alias);
        self
    }
}

impl DataTypeMigrator for JsonContentMigrator {
    fn needs_migration(
        &self,
        _definition: &FieldTypeDefinition,
        _ctx: &MigratorContext<'_>,
    ) -> Result<bool, MigratorError> {
        Ok(!self.extractors.is_empty())
    }

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
        if self.extractors.is_empty() {
            return Ok(None);
        }
        Ok(Some(JsonTransform::migration(self.extractors.clone())))
    }
}

/// `Umbraco.RelatedLinks`: an array of link objects. Cannot be downgraded.
pub fn related_links() -> JsonContentMigrator {
    let link = PropertyMigration::upgrade_only(Arc::new(RelatedLinkTransform));
    JsonContentMigrator::new(vec![Arc::new(ArrayElementExtractor::new(link))])
        .with_new_alias("Umbraco.RelatedLinks2")
}

/// `RJP.MultiUrlPicker`: an array of legacy URL picker entries.
pub fn multi_url_picker() -> JsonContentMigrator {
    let link = PropertyMigration::upgrade_only(Arc::new(MultiUrlLinkTransform));
    JsonContentMigrator::new(vec![Arc::new(ArrayElementExtractor::new(link))])
        .with_new_alias("Umbraco.MultiUrlPicker")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{BaseType, ContentNode, InMemoryRepository, SchemaType, StorageKind};
    use crate::datatype::{GridElementRegistry, MigratorRegistry};
    use crate::transform::{apply_transform, Direction, ReferenceCache, TransformContext};
    use serde_json::{json, Value};
    use uuid::Uuid;

    #[test]
    fn test_related_links_upgrade() {
        let repo = InMemoryRepository::new();
        let key = Uuid::new_v4();
        repo.add_schema_type(BaseType::Document, SchemaType::new(1, "page").with_icon("icon-home"));
        repo.add_node(ContentNode::new(1051, key, BaseType::Document, 1, "page").with_name("Home"));

        let migrators = MigratorRegistry::new();
        let grid = GridElementRegistry::new();
        let mctx = MigratorContext {
            repository: &repo,
            migrators: &migrators,
            grid_migrators: &grid,
            retain_invalid_data: false,
        };
        let definition =
            FieldTypeDefinition::new(20, "Links", "Umbraco.RelatedLinks", StorageKind::Ntext);
        let migrator = related_links();
        assert!(migrator.needs_migration(&definition, &mctx).unwrap());
        assert_eq!(migrator.new_editor_alias(&definition).unwrap(), "Umbraco.RelatedLinks2");
        assert_eq!(migrator.new_storage(&definition).unwrap(), StorageKind::Ntext);
        let migration = migrator.property_migration(&definition, &mctx).unwrap().unwrap();

        let links = json!([
            {"caption": "Home", "link": "1051", "isInternal": true},
            {"caption": "Elsewhere", "link": "https://example.com", "isInternal": false}
        ]);
        let mut node = ContentNode::new(5, Uuid::new_v4(), BaseType::Document, 1, "page")
            .with_value("links", links.to_string());

        let cache = ReferenceCache::new();
        let ctx = TransformContext::new(&repo, &cache);
        assert!(apply_transform(migration.upgrader(), &ctx, &mut node, "links").unwrap());

        let out: Value = serde_json::from_str(node.value("links").unwrap()).unwrap();
        let reference = format!("umb://document/{}", key.simple());
        assert_eq!(out[0]["link"], json!(reference));
        assert_eq!(out[0]["internalName"], json!("Home"));
        assert_eq!(out[0]["internalIcon"], json!("icon-home"));
        assert_eq!(out[1], links[1]);

        let err = apply_transform(migration.transform(Direction::Downgrade), &ctx, &mut node, "links");
        assert!(err.is_err());
    }

    #[test]
    fn test_multi_url_picker_alias() {
        let definition =
            FieldTypeDefinition::new(21, "Urls", "RJP.MultiUrlPicker", StorageKind::Ntext);
        assert_eq!(
            multi_url_picker().new_editor_alias(&definition).unwrap(),
            "Umbraco.MultiUrlPicker"
        );
    }
}
