//! Transforms that rewrite values nested inside a JSON field.
//!
//! A [`JsonExtractor`] points at the leaves of a parsed tree that hold
//! migratable sub-values. Each leaf is run through its own
//! [`PropertyMigration`] on a [`VirtualNode`]. The field is re-serialized
//! only when at least one leaf changed.

use std::sync::Arc;

use serde_json::Value;

use super::property::{
    apply_transform, Direction, PropertyMigration, PropertyTransform, TransformContext,
    TransformError, VirtualNode, VIRTUAL_VALUE_FIELD,
};

/// How a leaf is presented to its migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafEncoding {
    /// String leaves are passed raw, other leaves as JSON text. The result
    /// is written back as a JSON string.
    Text,
    /// The leaf is passed as JSON text and the result parsed back as JSON.
    Json,
}

/// A migratable location inside a JSON tree.
#[derive(Debug, Clone)]
pub struct JsonLeaf {
    /// JSON pointer to the leaf.
    pub pointer: String,
    /// How the leaf is read and written.
    pub encoding: LeafEncoding,
    /// Migration applied to the leaf.
    pub migration: PropertyMigration,
}

impl JsonLeaf {
    fn read(&self, tree: &Value) -> Option<String> {
        match (tree.pointer(&self.pointer)?, self.encoding) {
            (Value::Null, _) => None,
            (Value::String(s), LeafEncoding::Text) => Some(s.clone()),
            (other, _) => Some(other.to_string()),
        }
    }

    fn write(&self, tree: &mut Value, value: Option<String>) {
        let Some(slot) = tree.pointer_mut(&self.pointer) else {
            return;
        };
        *slot = match (value, self.encoding) {
            (None, _) => Value::Null,
            (Some(s), LeafEncoding::Text) => Value::String(s),
            (Some(s), LeafEncoding::Json) => {
                serde_json::from_str(&s).unwrap_or(Value::String(s))
            }
        };
    }
}

/// Yields the migratable leaves of one JSON structure.
pub trait JsonExtractor: Send + Sync {
    /// Leaves found in `tree`.
    fn leaves(&self, tree: &Value) -> Vec<JsonLeaf>;
}

/// Append one reference token to a JSON pointer.
pub fn pointer_child(base: &str, segment: impl std::fmt::Display) -> String {
    let segment = segment.to_string().replace('~', "~0").replace('/', "~1");
    format!("{}/{}", base, segment)
}

/// Applies every element of an array to the same migration, as JSON text.
#[derive(Debug, Clone)]
pub struct ArrayElementExtractor {
    migration: PropertyMigration,
}

impl ArrayElementExtractor {
    /// Create an extractor for top-level array elements.
    pub fn new(migration: PropertyMigration) -> Self {
        Self { migration }
    }
}

impl JsonExtractor for ArrayElementExtractor {
    fn leaves(&self, tree: &Value) -> Vec<JsonLeaf> {
        let Value::Array(items) = tree else {
            return Vec::new();
        };
        (0..items.len())
            .map(|idx| JsonLeaf {
                pointer: pointer_child("", idx),
                encoding: LeafEncoding::Json,
                migration: self.migration.clone(),
            })
            .collect()
    }
}

/// One direction of a JSON-subtree migration.
pub struct JsonTransform {
    extractors: Vec<Arc<dyn JsonExtractor>>,
    direction: Direction,
}

impl JsonTransform {
    /// Create a transform running `direction` over every extracted leaf.
    pub fn new(extractors: Vec<Arc<dyn JsonExtractor>>, direction: Direction) -> Self {
        Self {
            extractors,
            direction,
        }
    }

    /// Build the upgrade/downgrade pair for a set of extractors.
    pub fn migration(extractors: Vec<Arc<dyn JsonExtractor>>) -> PropertyMigration {
        PropertyMigration::new(
            Arc::new(JsonTransform::new(extractors.clone(), Direction::Upgrade)),
            Arc::new(JsonTransform::new(extractors, Direction::Downgrade)),
        )
    }
}

impl PropertyTransform for JsonTransform {
    fn name(&self) -> &'static str {
        "json"
    }

    fn map(&self, ctx: &TransformContext<'_>, from: &str) -> Result<Option<String>, TransformError> {
        if from.trim().is_empty() {
            return Ok(Some(from.to_string()));
        }

        let mut tree: Value = serde_json::from_str(from)?;
        let mut changed = false;

        for extractor in &self.extractors {
            for leaf in extractor.leaves(&tree) {
                let Some(value) = leaf.read(&tree) else {
                    continue;
                };

                let mut node = VirtualNode::new(Some(value));
                let transform = leaf.migration.transform(self.direction);
                if apply_transform(transform, ctx, &mut node, VIRTUAL_VALUE_FIELD)? {
                    leaf.write(&mut tree, node.into_value());
                    changed = true;
                }
            }
        }

        if changed {
            Ok(Some(serde_json::to_string(&tree)?))
        } else {
            Ok(Some(from.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{BaseType, ContentNode, InMemoryRepository};
    use crate::transform::{IdToReferenceTransform, ReferenceCache, ReferenceToIdTransform};
    use serde_json::json;
    use uuid::Uuid;

    struct PickerInObjects {
        migration: PropertyMigration,
    }

    impl JsonExtractor for PickerInObjects {
        fn leaves(&self, tree: &Value) -> Vec<JsonLeaf> {
            let Value::Array(items) = tree else {
                return Vec::new();
            };
            (0..items.len())
                .map(|idx| JsonLeaf {
                    pointer: pointer_child(&pointer_child("", idx), "picker"),
                    encoding: LeafEncoding::Text,
                    migration: self.migration.clone(),
                })
                .collect()
        }
    }

    fn picker_transform(direction: Direction) -> JsonTransform {
        let migration = PropertyMigration::new(
            Arc::new(IdToReferenceTransform::new(BaseType::Document, false)),
            Arc::new(ReferenceToIdTransform::new()),
        );
        JsonTransform::new(vec![Arc::new(PickerInObjects { migration })], direction)
    }

    fn repo() -> (InMemoryRepository, Uuid) {
        let repo = InMemoryRepository::new();
        let key = Uuid::new_v4();
        repo.add_node(ContentNode::new(12, key, BaseType::Document, 1, "page"));
        (repo, key)
    }

    #[test]
    fn test_rewrites_nested_leaves() {
        let (repo, key) = repo();
        let cache = ReferenceCache::new();
        let ctx = TransformContext::new(&repo, &cache);

        let from = r#"[{"picker":"12","title":"a"},{"title":"b"}]"#;
        let to = picker_transform(Direction::Upgrade).map(&ctx, from).unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&to).unwrap();

        assert_eq!(
            parsed,
            json!([
                {"picker": format!("umb://document/{}", key.simple()), "title": "a"},
                {"title": "b"}
            ])
        );

        let back = picker_transform(Direction::Downgrade).map(&ctx, &to).unwrap().unwrap();
        assert_eq!(back, r#"[{"picker":"12","title":"a"},{"title":"b"}]"#);
    }

    #[test]
    fn test_unchanged_tree_returns_original_text() {
        let (repo, _) = repo();
        let cache = ReferenceCache::new();
        let ctx = TransformContext::new(&repo, &cache);

        // Whitespace and key order must survive when nothing changes.
        let from = "[ { \"title\": \"a\",  \"picker\": \"umb://document/abc\" } ]";
        let to = picker_transform(Direction::Upgrade).map(&ctx, from).unwrap();
        assert_eq!(to.as_deref(), Some(from));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let (repo, _) = repo();
        let cache = ReferenceCache::new();
        let ctx = TransformContext::new(&repo, &cache);

        let err = picker_transform(Direction::Upgrade).map(&ctx, "{not json").unwrap_err();
        assert!(matches!(err, TransformError::InvalidJson(_)));
    }

    #[test]
    fn test_pointer_child_escapes() {
        assert_eq!(pointer_child("", "a/b~c"), "/a~1b~0c");
        assert_eq!(pointer_child("/sections", 0), "/sections/0");
    }
}
