//! Field type definitions and their per-editor configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a field's value is physically stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Integer column.
    Integer,
    /// Decimal column.
    Decimal,
    /// Date column.
    Date,
    /// Short string column.
    Nvarchar,
    /// Long text column.
    Ntext,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Integer => write!(f, "integer"),
            StorageKind::Decimal => write!(f, "decimal"),
            StorageKind::Date => write!(f, "date"),
            StorageKind::Nvarchar => write!(f, "nvarchar"),
            StorageKind::Ntext => write!(f, "ntext"),
        }
    }
}

/// Which tree a picker starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeSourceType {
    /// The document tree.
    Content,
    /// The media tree.
    Media,
    /// The member list.
    Member,
}

/// Start node of a tree picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSource {
    /// Which tree to pick from.
    #[serde(rename = "type")]
    pub source_type: TreeSourceType,
    /// Dynamic root query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Fixed start node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Content picker settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPickerConfig {
    /// Start node.
    pub start_node_id: Option<String>,
    /// Show an "open" button next to the picked item.
    pub show_open_button: bool,
}

/// Media picker settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPickerConfig {
    /// Allow picking more than one item.
    pub multiple: bool,
    /// Restrict to images.
    pub only_images: bool,
    /// Prevent picking folders.
    pub disable_folder_select: bool,
    /// Start node.
    pub start_node_id: Option<String>,
}

/// Multi-node tree picker settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePickerConfig {
    /// Start node and tree.
    pub start_node: Option<TreeSource>,
    /// Allowed schema aliases, comma-separated.
    pub filter: Option<String>,
    /// Minimum number of items.
    pub min_number: Option<u32>,
    /// Maximum number of items.
    pub max_number: Option<u32>,
}

/// One grid area and the editors it allows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridArea {
    /// Every registered editor is allowed.
    #[serde(default, rename = "allowAll")]
    pub allow_all: bool,
    /// Explicitly allowed editor aliases.
    #[serde(default)]
    pub allowed: Vec<String>,
}

/// One grid layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    /// Layout name.
    #[serde(default)]
    pub name: Option<String>,
    /// Areas in this layout.
    #[serde(default)]
    pub areas: Vec<GridArea>,
}

/// Grid editor settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Available layouts.
    #[serde(default)]
    pub layouts: Vec<GridLayout>,
    /// Row configurations, kept as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<serde_json::Value>,
    /// Rich text settings, kept as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rte: Option<serde_json::Value>,
}

/// Editor configuration, one variant per editor kind.
///
/// Editors without a typed variant keep their legacy key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldTypeConfig {
    /// No configuration.
    #[default]
    None,
    /// Content picker.
    ContentPicker(ContentPickerConfig),
    /// Single or multiple media picker.
    MediaPicker(MediaPickerConfig),
    /// Member picker.
    MemberPicker,
    /// Multi-node tree picker.
    TreePicker(TreePickerConfig),
    /// Grid layout editor.
    Grid(GridConfig),
    /// Untyped legacy key/value pairs.
    PreValues(BTreeMap<String, Option<String>>),
}

impl FieldTypeConfig {
    /// Structural equality that also treats a missing pre-value, an empty
    /// pre-value and a null pre-value as the same thing.
    pub fn is_equivalent(&self, other: &FieldTypeConfig) -> bool {
        match (self, other) {
            (FieldTypeConfig::PreValues(a), FieldTypeConfig::PreValues(b)) => {
                let normalized = |m: &BTreeMap<String, Option<String>>, k: &str| {
                    m.get(k)
                        .and_then(|v| v.as_deref())
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                };
                a.keys()
                    .chain(b.keys())
                    .all(|k| normalized(a, k) == normalized(b, k))
            }
            _ => self == other,
        }
    }

    /// Look up a legacy pre-value.
    pub fn pre_value(&self, key: &str) -> Option<&str> {
        match self {
            FieldTypeConfig::PreValues(values) => values.get(key).and_then(|v| v.as_deref()),
            _ => None,
        }
    }
}

/// Identifies a field type definition either by id or by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTypeRef {
    /// Integer id.
    Id(i64),
    /// Global key.
    Key(Uuid),
}

impl FieldTypeRef {
    /// Parse either an integer id or a GUID.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Some(FieldTypeRef::Id(id));
        }
        Uuid::parse_str(s).ok().map(FieldTypeRef::Key)
    }

    /// Whether this reference points at `definition`.
    pub fn matches(&self, definition: &FieldTypeDefinition) -> bool {
        match self {
            FieldTypeRef::Id(id) => definition.id == *id,
            FieldTypeRef::Key(key) => definition.key == *key,
        }
    }
}

/// A reusable, named configuration of how a field is edited and stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTypeDefinition {
    /// Definition id.
    pub id: i64,
    /// Global key.
    pub key: Uuid,
    /// Display name.
    pub name: String,
    /// Editor alias that selects the migrator.
    pub editor_alias: String,
    /// Physical storage.
    pub storage: StorageKind,
    /// Editor configuration.
    pub config: FieldTypeConfig,
}

impl FieldTypeDefinition {
    /// Create a definition with no configuration.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        editor_alias: impl Into<String>,
        storage: StorageKind,
    ) -> Self {
        Self {
            id,
            key: Uuid::new_v4(),
            name: name.into(),
            editor_alias: editor_alias.into(),
            storage,
            config: FieldTypeConfig::None,
        }
    }

    /// Set the global key.
    pub fn with_key(mut self, key: Uuid) -> Self {
        self.key = key;
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: FieldTypeConfig) -> Self {
        self.config = config;
        self
    }
}

/// An editor registered for use inside grid controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridEditor {
    /// Editor alias used in grid controls.
    pub alias: String,
    /// Nested property editors as `(field type id or key, property alias)`.
    #[serde(default)]
    pub nested_editors: Vec<(String, String)>,
    /// Schema aliases whose content can be embedded.
    #[serde(default)]
    pub allowed_schema_types: Vec<String>,
}

impl GridEditor {
    /// Create an editor with no nested properties.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..Default::default()
        }
    }

    /// Add a nested property editor.
    pub fn with_nested_editor(mut self, field_type: impl Into<String>, alias: impl Into<String>) -> Self {
        self.nested_editors.push((field_type.into(), alias.into()));
        self
    }

    /// Allow embedding content of a schema type.
    pub fn with_allowed_schema_type(mut self, alias: impl Into<String>) -> Self {
        self.allowed_schema_types.push(alias.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pre_values(pairs: &[(&str, Option<&str>)]) -> FieldTypeConfig {
        FieldTypeConfig::PreValues(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
        )
    }

    #[test]
    fn test_pre_values_equivalence_ignores_empty() {
        let a = pre_values(&[("startNodeId", Some("1")), ("empty", Some(""))]);
        let b = pre_values(&[("startNodeId", Some("1")), ("other", None)]);
        assert!(a.is_equivalent(&b));

        let c = pre_values(&[("startNodeId", Some("2"))]);
        assert!(!a.is_equivalent(&c));
    }

    #[test]
    fn test_typed_equivalence_is_structural() {
        let a = FieldTypeConfig::MediaPicker(MediaPickerConfig {
            multiple: true,
            ..Default::default()
        });
        let b = FieldTypeConfig::MediaPicker(MediaPickerConfig {
            multiple: true,
            ..Default::default()
        });
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&FieldTypeConfig::MediaPicker(MediaPickerConfig::default())));
        assert!(!a.is_equivalent(&FieldTypeConfig::None));
    }

    #[test]
    fn test_field_type_ref_parse() {
        assert_eq!(FieldTypeRef::parse(" 42 "), Some(FieldTypeRef::Id(42)));
        let key = Uuid::new_v4();
        assert_eq!(
            FieldTypeRef::parse(&key.to_string()),
            Some(FieldTypeRef::Key(key))
        );
        assert_eq!(FieldTypeRef::parse("nope"), None);
    }

    #[test]
    fn test_grid_config_deserializes_host_shape() {
        let json = r#"{"layouts":[{"name":"1 column","areas":[{"allowAll":true},{"allowed":["rte","media"]}]}]}"#;
        let config: GridConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.layouts.len(), 1);
        assert!(config.layouts[0].areas[0].allow_all);
        assert_eq!(config.layouts[0].areas[1].allowed, vec!["rte", "media"]);
    }
}
