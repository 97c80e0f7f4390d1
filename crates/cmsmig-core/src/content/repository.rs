//! The content repository API consumed from the host platform.

use uuid::Uuid;

use super::field_type::{FieldTypeDefinition, FieldTypeRef, GridEditor};
use super::node::{BaseType, ContentNode};
use super::schema::SchemaType;
use crate::error::RepositoryError;

/// One page of a paged query.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: u64,
}

/// Result of a save-and-publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Whether the node was published.
    pub success: bool,
    /// Host status code, e.g. `FailedContentInvalid`.
    pub status: String,
    /// Fields that failed validation.
    pub invalid_fields: Vec<String>,
    /// Messages raised by event handlers.
    pub messages: Vec<String>,
}

impl PublishOutcome {
    /// A successful publish.
    pub fn published() -> Self {
        Self {
            success: true,
            status: "Success".to_string(),
            invalid_fields: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// A rejected publish.
    pub fn rejected(status: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
            invalid_fields: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Human-readable description of a rejected publish.
    pub fn describe(&self) -> String {
        let mut out = self.status.clone();
        if !self.invalid_fields.is_empty() {
            out.push_str(&format!(
                ", the following properties were invalid: {}",
                self.invalid_fields.join(", ")
            ));
        }
        if !self.messages.is_empty() {
            out.push_str(&format!(", messages: {}", self.messages.join("; ")));
        }
        out
    }
}

/// Host storage services for content, schema types and field types.
///
/// Implementations are expected to be used from one thread at a time
/// while a migration runs.
pub trait ContentRepository: Send + Sync {
    /// Fetch a node by integer identity.
    fn node_by_id(&self, base_type: BaseType, id: i64) -> Result<Option<ContentNode>, RepositoryError>;

    /// Fetch a node by global key.
    fn node_by_key(&self, base_type: BaseType, key: Uuid)
        -> Result<Option<ContentNode>, RepositoryError>;

    /// Page through nodes whose schema type is one of `schema_ids`.
    ///
    /// Ordering must be stable across calls.
    fn nodes_of_types(
        &self,
        base_type: BaseType,
        schema_ids: &[i64],
        page_index: u64,
        page_size: usize,
    ) -> Result<Page<ContentNode>, RepositoryError>;

    /// Save a document without publishing it.
    fn save_document(&self, node: &ContentNode, raise_events: bool) -> Result<(), RepositoryError>;

    /// Save a document and publish it.
    fn save_and_publish_document(
        &self,
        node: &ContentNode,
        raise_events: bool,
    ) -> Result<PublishOutcome, RepositoryError>;

    /// Save a media item.
    fn save_media(&self, node: &ContentNode, raise_events: bool) -> Result<(), RepositoryError>;

    /// Save a member.
    fn save_member(&self, node: &ContentNode, raise_events: bool) -> Result<(), RepositoryError>;

    /// All schema types of a base type.
    fn schema_types(&self, base_type: BaseType) -> Result<Vec<SchemaType>, RepositoryError>;

    /// Find a schema type by alias, ignoring ASCII case.
    fn schema_type(
        &self,
        base_type: BaseType,
        alias: &str,
    ) -> Result<Option<SchemaType>, RepositoryError> {
        Ok(self
            .schema_types(base_type)?
            .into_iter()
            .find(|s| s.alias.eq_ignore_ascii_case(alias)))
    }

    /// All field type definitions.
    fn field_types(&self) -> Result<Vec<FieldTypeDefinition>, RepositoryError>;

    /// Find a field type definition by id or key.
    fn field_type(
        &self,
        reference: FieldTypeRef,
    ) -> Result<Option<FieldTypeDefinition>, RepositoryError> {
        Ok(self
            .field_types()?
            .into_iter()
            .find(|d| reference.matches(d)))
    }

    /// Persist a field type definition.
    fn save_field_type(&self, definition: &FieldTypeDefinition) -> Result<(), RepositoryError>;

    /// Editors available inside grid controls.
    fn grid_editors(&self) -> Result<Vec<GridEditor>, RepositoryError> {
        Ok(Vec::new())
    }
}
