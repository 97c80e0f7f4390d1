//! Field mappings and the mappers that persist transformed nodes.

use chrono::Utc;
use thiserror::Error;

use super::source::ContentSource;
use crate::content::{BaseType, ContentNode, ContentRepository};
use crate::error::RepositoryError;
use crate::transform::PropertyMigration;

/// Failure to persist a transformed node.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The document was saved but could not be re-published.
    #[error("Error publishing the document '{name}' (#{id}), {status}")]
    PublishRejected {
        /// Document name.
        name: String,
        /// Document id.
        id: i64,
        /// Description of the rejected outcome.
        status: String,
    },

    /// The repository refused the save.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Binds a field to the migrations applied to it, in order.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    /// Field alias on the node.
    pub field: String,
    /// Migrations applied one after another.
    pub migrations: Vec<PropertyMigration>,
}

impl FieldMapping {
    /// Map a field through a single migration.
    pub fn new(field: impl Into<String>, migration: PropertyMigration) -> Self {
        Self {
            field: field.into(),
            migrations: vec![migration],
        }
    }

    /// Append another migration.
    pub fn then(mut self, migration: PropertyMigration) -> Self {
        self.migrations.push(migration);
        self
    }
}

/// Snapshot taken before a node is transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreChangeState {
    /// The node was live before the change and must be re-published.
    pub was_published: bool,
}

/// Binds a content source to its field mappings and knows how to save.
pub trait TransformMapper: Send + Sync {
    /// Nodes this mapper visits.
    fn source(&self) -> &dyn ContentSource;

    /// Field mappings applied to every node.
    fn field_mappings(&self) -> &[FieldMapping];

    /// Capture what is needed to save the node afterward.
    fn retrieve_pre_change_state(&self, node: &ContentNode)
        -> Result<PreChangeState, RepositoryError>;

    /// Persist a transformed node.
    fn save_changes(
        &self,
        repository: &dyn ContentRepository,
        node: &ContentNode,
        state: &PreChangeState,
    ) -> Result<(), SaveError>;
}

/// Default mapper: re-publishes documents that were live, plain-saves the rest.
pub struct ContentTransformMapper {
    source: Box<dyn ContentSource>,
    field_mappings: Vec<FieldMapping>,
    raise_events: bool,
}

impl ContentTransformMapper {
    /// Create a mapper.
    pub fn new(source: Box<dyn ContentSource>, field_mappings: Vec<FieldMapping>) -> Self {
        Self {
            source,
            field_mappings,
            raise_events: false,
        }
    }

    /// Forward save and publish events to host handlers.
    pub fn with_raise_events(mut self, raise_events: bool) -> Self {
        self.raise_events = raise_events;
        self
    }
}

impl TransformMapper for ContentTransformMapper {
    fn source(&self) -> &dyn ContentSource {
        self.source.as_ref()
    }

    fn field_mappings(&self) -> &[FieldMapping] {
        &self.field_mappings
    }

    fn retrieve_pre_change_state(
        &self,
        node: &ContentNode,
    ) -> Result<PreChangeState, RepositoryError> {
        Ok(PreChangeState {
            was_published: node.base_type == BaseType::Document && node.is_live_at(Utc::now()),
        })
    }

    fn save_changes(
        &self,
        repository: &dyn ContentRepository,
        node: &ContentNode,
        state: &PreChangeState,
    ) -> Result<(), SaveError> {
        match self.source.base_type() {
            BaseType::Document if state.was_published => {
                let outcome = repository.save_and_publish_document(node, self.raise_events)?;
                if outcome.success {
                    return Ok(());
                }

                // Keep the field change even though the publish was refused.
                repository.save_document(node, self.raise_events)?;
                Err(SaveError::PublishRejected {
                    name: node.name.clone(),
                    id: node.id,
                    status: outcome.describe(),
                })
            }
            BaseType::Document => Ok(repository.save_document(node, self.raise_events)?),
            BaseType::Media => Ok(repository.save_media(node, self.raise_events)?),
            BaseType::Member => Ok(repository.save_member(node, self.raise_events)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryRepository;
    use crate::mapping::ContentsByTypeSource;
    use uuid::Uuid;

    fn mapper(base_type: BaseType) -> ContentTransformMapper {
        ContentTransformMapper::new(Box::new(ContentsByTypeSource::new(base_type, "page")), vec![])
    }

    #[test]
    fn test_published_document_is_republished() {
        let repo = InMemoryRepository::new();
        let node = ContentNode::new(1, Uuid::new_v4(), BaseType::Document, 1, "page")
            .with_published(true);
        let mapper = mapper(BaseType::Document);

        let state = mapper.retrieve_pre_change_state(&node).unwrap();
        assert!(state.was_published);
        mapper.save_changes(&repo, &node, &state).unwrap();

        let saves = repo.saves();
        assert_eq!(saves.len(), 1);
        assert!(saves[0].published);
    }

    #[test]
    fn test_draft_document_is_saved_only() {
        let repo = InMemoryRepository::new();
        let node = ContentNode::new(1, Uuid::new_v4(), BaseType::Document, 1, "page");
        let mapper = mapper(BaseType::Document);

        let state = mapper.retrieve_pre_change_state(&node).unwrap();
        mapper.save_changes(&repo, &node, &state).unwrap();
        assert!(!repo.saves()[0].published);
    }

    #[test]
    fn test_rejected_publish_saves_then_errors() {
        let repo = InMemoryRepository::new();
        repo.reject_publish_of(7);
        let node = ContentNode::new(7, Uuid::new_v4(), BaseType::Document, 1, "page")
            .with_name("Home")
            .with_published(true);
        let mapper = mapper(BaseType::Document);

        let state = mapper.retrieve_pre_change_state(&node).unwrap();
        let err = mapper.save_changes(&repo, &node, &state).unwrap_err();

        assert!(matches!(err, SaveError::PublishRejected { id: 7, .. }));
        assert!(err.to_string().starts_with("Error publishing the document 'Home' (#7)"));
        assert_eq!(repo.saves().len(), 1);
        assert!(!repo.saves()[0].published);
    }

    #[test]
    fn test_media_never_published() {
        let repo = InMemoryRepository::new();
        let node = ContentNode::new(3, Uuid::new_v4(), BaseType::Media, 1, "image")
            .with_published(true);
        let mapper = mapper(BaseType::Media);

        let state = mapper.retrieve_pre_change_state(&node).unwrap();
        assert!(!state.was_published);
        mapper.save_changes(&repo, &node, &state).unwrap();
        assert!(!repo.saves()[0].published);
    }
}
