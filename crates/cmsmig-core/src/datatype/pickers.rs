//! Migrators for pickers that store integer identities.
//!
//! Every picker here is upgraded the same way: its values are rewritten
//! from comma-separated ids to global references, its storage becomes
//! long text and it moves to the reference-based editor alias.

use std::sync::Arc;

use serde_json::Value;

use super::migrator::{DataTypeMigrator, MigratorContext, MigratorError};
use crate::content::{
    BaseType, FieldTypeConfig, FieldTypeDefinition, MediaPickerConfig, StorageKind, TreeSourceType,
};
use crate::transform::{IdToReferenceTransform, PropertyMigration, ReferenceToIdTransform};

/// Which kind of node a picker's values refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// Always the given base type.
    Fixed(BaseType),
    /// Media when the configured start node is in the media tree, else
    /// documents.
    StartNode,
}

/// How a picker's configuration changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRule {
    /// Leave the configuration untouched.
    Keep,
    /// Rebuild as a media picker, keeping only the start node.
    MediaPicker {
        /// Allow picking more than one item.
        multiple: bool,
    },
}

/// Migrates a picker from integer identities to global references.
#[derive(Debug, Clone)]
pub struct ReferencePickerMigrator {
    new_alias: &'static str,
    target: ReferenceTarget,
    config_rule: ConfigRule,
}

impl ReferencePickerMigrator {
    /// Create a migrator moving to `new_alias`.
    pub fn new(new_alias: &'static str, target: ReferenceTarget) -> Self {
        Self {
            new_alias,
            target,
            config_rule: ConfigRule::Keep,
        }
    }

    /// Set how the configuration is rewritten.
    pub fn with_config_rule(mut self, rule: ConfigRule) -> Self {
        self.config_rule = rule;
        self
    }

    /// `Umbraco.ContentPickerAlias`.
    pub fn content_picker() -> Self {
        Self::new("Umbraco.ContentPicker2", ReferenceTarget::Fixed(BaseType::Document))
    }

    /// `Umbraco.MediaPicker`.
    pub fn media_picker() -> Self {
        Self::new("Umbraco.MediaPicker2", ReferenceTarget::Fixed(BaseType::Media))
            .with_config_rule(ConfigRule::MediaPicker { multiple: false })
    }

    /// `Umbraco.MultipleMediaPicker`.
    pub fn multiple_media_picker() -> Self {
        Self::new("Umbraco.MediaPicker2", ReferenceTarget::Fixed(BaseType::Media))
            .with_config_rule(ConfigRule::MediaPicker { multiple: true })
    }

    /// `Umbraco.MemberPicker`.
    pub fn member_picker() -> Self {
        Self::new("Umbraco.MemberPicker2", ReferenceTarget::Fixed(BaseType::Member))
    }

    /// `Umbraco.MultiNodeTreePicker`.
    pub fn tree_picker() -> Self {
        Self::new("Umbraco.MultiNodeTreePicker2", ReferenceTarget::StartNode)
    }

    /// Base type the picker's values refer to.
    pub fn target_base_type(&self, definition: &FieldTypeDefinition) -> BaseType {
        match self.target {
            ReferenceTarget::Fixed(base_type) => base_type,
            ReferenceTarget::StartNode if starts_in_media(&definition.config) => BaseType::Media,
            ReferenceTarget::StartNode => BaseType::Document,
        }
    }
}

fn starts_in_media(config: &FieldTypeConfig) -> bool {
    match config {
        FieldTypeConfig::TreePicker(tree) => tree
            .start_node
            .as_ref()
            .is_some_and(|s| s.source_type == TreeSourceType::Media),
        FieldTypeConfig::PreValues(_) => config
            .pre_value("startNode")
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .and_then(|v| v.get("type").and_then(Value::as_str).map(str::to_string))
            .is_some_and(|t| t.eq_ignore_ascii_case("media")),
        _ => false,
    }
}

fn start_node_id(config: &FieldTypeConfig) -> Option<String> {
    match config {
        FieldTypeConfig::MediaPicker(media) => media.start_node_id.clone(),
        FieldTypeConfig::ContentPicker(content) => content.start_node_id.clone(),
        _ => config
            .pre_value("startNodeId")
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string),
    }
}

impl DataTypeMigrator for ReferencePickerMigrator {
    fn new_editor_alias(&self, _definition: &FieldTypeDefinition) -> Result<String, MigratorError> {
        Ok(self.new_alias.to_string())
    }

    fn new_storage(&self, _definition: &FieldTypeDefinition) -> Result<StorageKind, MigratorError> {
        Ok(StorageKind::Ntext)
    }

    fn new_config(&self, definition: &FieldTypeDefinition) -> Result<FieldTypeConfig, MigratorError> {
        match self.config_rule {
            ConfigRule::Keep => Ok(definition.config.clone()),
            ConfigRule::MediaPicker { multiple } => {
                Ok(FieldTypeConfig::MediaPicker(MediaPickerConfig {
                    multiple,
                    only_images: false,
                    disable_folder_select: false,
                    start_node_id: start_node_id(&definition.config),
                }))
            }
        }
    }

    fn property_migration(
        &self,
        definition: &FieldTypeDefinition,
        ctx: &MigratorContext<'_>,
    ) -> Result<Option<PropertyMigration>, MigratorError> {
        let base_type = self.target_base_type(definition);
        Ok(Some(PropertyMigration::new(
            Arc::new(IdToReferenceTransform::new(base_type, ctx.retain_invalid_data)),
            Arc::new(ReferenceToIdTransform::new()),
        )))
    }
}
