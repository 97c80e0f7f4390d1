//! Content nodes as seen by the migration engine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three disjoint kinds of stored content.
///
/// Each kind has its own persistence API in the host repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    /// Pages and other tree content.
    Document,
    /// Images, files and folders.
    Media,
    /// Site members.
    Member,
}

impl BaseType {
    /// All base types, in fan-out order.
    pub const ALL: [BaseType; 3] = [BaseType::Document, BaseType::Media, BaseType::Member];

    /// Entity name used as the host part of a global reference.
    pub fn entity_name(&self) -> &'static str {
        match self {
            BaseType::Document => "document",
            BaseType::Media => "media",
            BaseType::Member => "member",
        }
    }

    /// Parse an entity name, ignoring ASCII case.
    pub fn from_entity_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.entity_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_name())
    }
}

/// A stored content item.
///
/// Field values are string-serializable; a field that exists but holds
/// no value is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    /// Repository-local integer identity.
    pub id: i64,
    /// Globally unique key.
    pub key: Uuid,
    /// Which persistence API owns this node.
    pub base_type: BaseType,
    /// Id of the node's schema type.
    pub schema_id: i64,
    /// Alias of the node's schema type.
    pub schema_alias: String,
    /// Display name.
    pub name: String,
    /// Whether a published version exists.
    pub published: bool,
    /// Whether the node sits in the recycle bin.
    pub trashed: bool,
    /// Scheduled unpublish date, if any.
    pub expire_date: Option<DateTime<Utc>>,
    values: BTreeMap<String, Option<String>>,
}

impl ContentNode {
    /// Create a node with no fields.
    pub fn new(
        id: i64,
        key: Uuid,
        base_type: BaseType,
        schema_id: i64,
        schema_alias: impl Into<String>,
    ) -> Self {
        Self {
            id,
            key,
            base_type,
            schema_id,
            schema_alias: schema_alias.into(),
            name: format!("{} {}", base_type, id),
            published: false,
            trashed: false,
            expire_date: None,
            values: BTreeMap::new(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark the node as published.
    pub fn with_published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }

    /// Mark the node as trashed.
    pub fn with_trashed(mut self, trashed: bool) -> Self {
        self.trashed = trashed;
        self
    }

    /// Set a scheduled expiry.
    pub fn with_expire_date(mut self, expire_date: DateTime<Utc>) -> Self {
        self.expire_date = Some(expire_date);
        self
    }

    /// Add a field with a value.
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(field.into(), Some(value.into()));
        self
    }

    /// Add a field that holds no value.
    pub fn with_empty_field(mut self, field: impl Into<String>) -> Self {
        self.values.insert(field.into(), None);
        self
    }

    /// Whether the node's schema declares this field.
    pub fn has_field(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Current value of a field.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(|v| v.as_deref())
    }

    /// Replace a field's value, adding the field if missing.
    pub fn set_value(&mut self, field: &str, value: Option<String>) {
        self.values.insert(field.to_string(), value);
    }

    /// Iterate over all fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Whether the node is live at `now`: published, not trashed, not expired.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.published && !self.trashed && self.expire_date.map_or(true, |d| d > now)
    }
}
