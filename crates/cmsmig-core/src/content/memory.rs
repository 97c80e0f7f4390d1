//! In-memory content repository.
//!
//! A complete [`ContentRepository`] and [`ScopeProvider`] held in process
//! memory. Writes can be made to fail per node or per field type, which
//! makes it the host of choice for demos and tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use uuid::Uuid;

use super::field_type::{FieldTypeDefinition, GridEditor};
use super::node::{BaseType, ContentNode};
use super::repository::{ContentRepository, Page, PublishOutcome};
use super::schema::SchemaType;
use crate::error::RepositoryError;
use crate::migration::{ScopeProvider, StoreError, TransactionScope};

/// A write observed by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    /// Base type of the saved node.
    pub base_type: BaseType,
    /// Id of the saved node.
    pub id: i64,
    /// Whether the save also published the node.
    pub published: bool,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<(BaseType, i64), ContentNode>,
    schema_types: BTreeMap<BaseType, Vec<SchemaType>>,
    field_types: BTreeMap<i64, FieldTypeDefinition>,
    grid_editors: Vec<GridEditor>,
    failing_saves: HashSet<(BaseType, i64)>,
    rejected_publishes: HashSet<i64>,
    failing_field_types: HashSet<i64>,
    saves: Vec<SaveRecord>,
    field_type_saves: Vec<i64>,
    open_scopes: usize,
    committed_scopes: usize,
    released_scopes: usize,
}

/// Repository backed by in-process maps.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
    lookups: AtomicU64,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node.
    pub fn add_node(&self, node: ContentNode) {
        self.state
            .write()
            .nodes
            .insert((node.base_type, node.id), node);
    }

    /// Add a schema type.
    pub fn add_schema_type(&self, base_type: BaseType, schema: SchemaType) {
        self.state
            .write()
            .schema_types
            .entry(base_type)
            .or_default()
            .push(schema);
    }

    /// Add or replace a field type definition.
    pub fn add_field_type(&self, definition: FieldTypeDefinition) {
        self.state
            .write()
            .field_types
            .insert(definition.id, definition);
    }

    /// Register an editor usable in grid controls.
    pub fn add_grid_editor(&self, editor: GridEditor) {
        self.state.write().grid_editors.push(editor);
    }

    /// Make every save of this node fail.
    pub fn fail_saves_of(&self, base_type: BaseType, id: i64) {
        self.state.write().failing_saves.insert((base_type, id));
    }

    /// Make publishing this document report a rejected outcome.
    pub fn reject_publish_of(&self, id: i64) {
        self.state.write().rejected_publishes.insert(id);
    }

    /// Make saving this field type definition fail.
    pub fn fail_field_type_save(&self, id: i64) {
        self.state.write().failing_field_types.insert(id);
    }

    /// Current copy of a node.
    pub fn node(&self, base_type: BaseType, id: i64) -> Option<ContentNode> {
        self.state.read().nodes.get(&(base_type, id)).cloned()
    }

    /// Current copy of a field type definition.
    pub fn field_type_by_id(&self, id: i64) -> Option<FieldTypeDefinition> {
        self.state.read().field_types.get(&id).cloned()
    }

    /// Every successful node save, in order.
    pub fn saves(&self) -> Vec<SaveRecord> {
        self.state.read().saves.clone()
    }

    /// Ids of every successful field type save, in order.
    pub fn field_type_saves(&self) -> Vec<i64> {
        self.state.read().field_type_saves.clone()
    }

    /// Number of single-node lookups served.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Scopes currently held open.
    pub fn open_scopes(&self) -> usize {
        self.state.read().open_scopes
    }

    /// `(committed, released without commit)` scope counts.
    pub fn scope_outcomes(&self) -> (usize, usize) {
        let state = self.state.read();
        (state.committed_scopes, state.released_scopes)
    }

    fn store(&self, node: &ContentNode, published: bool) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        if state.failing_saves.contains(&(node.base_type, node.id)) {
            return Err(RepositoryError::Rejected {
                base_type: node.base_type,
                id: node.id,
                reason: "save failed".to_string(),
            });
        }

        let mut stored = node.clone();
        if published {
            stored.published = true;
        }
        state.nodes.insert((node.base_type, node.id), stored);
        state.saves.push(SaveRecord {
            base_type: node.base_type,
            id: node.id,
            published,
        });
        Ok(())
    }
}

impl ContentRepository for InMemoryRepository {
    fn node_by_id(&self, base_type: BaseType, id: i64) -> Result<Option<ContentNode>, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.node(base_type, id))
    }

    fn node_by_key(
        &self,
        base_type: BaseType,
        key: Uuid,
    ) -> Result<Option<ContentNode>, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .state
            .read()
            .nodes
            .values()
            .find(|n| n.base_type == base_type && n.key == key)
            .cloned())
    }

    fn nodes_of_types(
        &self,
        base_type: BaseType,
        schema_ids: &[i64],
        page_index: u64,
        page_size: usize,
    ) -> Result<Page<ContentNode>, RepositoryError> {
        let state = self.state.read();
        let matching: Vec<&ContentNode> = state
            .nodes
            .values()
            .filter(|n| n.base_type == base_type && schema_ids.contains(&n.schema_id))
            .collect();

        let total = matching.len() as u64;
        let start = (page_index as usize).saturating_mul(page_size);
        let items = matching
            .into_iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();

        Ok(Page { items, total })
    }

    fn save_document(&self, node: &ContentNode, _raise_events: bool) -> Result<(), RepositoryError> {
        self.store(node, false)
    }

    fn save_and_publish_document(
        &self,
        node: &ContentNode,
        _raise_events: bool,
    ) -> Result<PublishOutcome, RepositoryError> {
        if self.state.read().rejected_publishes.contains(&node.id) {
            let mut outcome = PublishOutcome::rejected("FailedContentInvalid");
            outcome.invalid_fields = node.fields().map(|(k, _)| k.to_string()).collect();
            return Ok(outcome);
        }
        self.store(node, true)?;
        Ok(PublishOutcome::published())
    }

    fn save_media(&self, node: &ContentNode, _raise_events: bool) -> Result<(), RepositoryError> {
        self.store(node, false)
    }

    fn save_member(&self, node: &ContentNode, _raise_events: bool) -> Result<(), RepositoryError> {
        self.store(node, false)
    }

    fn schema_types(&self, base_type: BaseType) -> Result<Vec<SchemaType>, RepositoryError> {
        Ok(self
            .state
            .read()
            .schema_types
            .get(&base_type)
            .cloned()
            .unwrap_or_default())
    }

    fn field_types(&self) -> Result<Vec<FieldTypeDefinition>, RepositoryError> {
        Ok(self.state.read().field_types.values().cloned().collect())
    }

    fn save_field_type(&self, definition: &FieldTypeDefinition) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        if state.failing_field_types.contains(&definition.id) {
            return Err(RepositoryError::Backend(format!(
                "could not write field type {}",
                definition.id
            )));
        }
        state.field_types.insert(definition.id, definition.clone());
        state.field_type_saves.push(definition.id);
        Ok(())
    }

    fn grid_editors(&self) -> Result<Vec<GridEditor>, RepositoryError> {
        Ok(self.state.read().grid_editors.clone())
    }
}

/// Scope handed out by [`InMemoryRepository`].
struct MemoryScope<'a> {
    repository: &'a InMemoryRepository,
    committed: bool,
}

impl TransactionScope for MemoryScope<'_> {
    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.committed = true;
        self.repository.state.write().committed_scopes += 1;
        Ok(())
    }
}

impl Drop for MemoryScope<'_> {
    fn drop(&mut self) {
        let mut state = self.repository.state.write();
        state.open_scopes -= 1;
        if !self.committed {
            state.released_scopes += 1;
        }
    }
}

impl ScopeProvider for InMemoryRepository {
    fn begin(&self) -> Result<Box<dyn TransactionScope + '_>, StoreError> {
        self.state.write().open_scopes += 1;
        Ok(Box::new(MemoryScope {
            repository: self,
            committed: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_with_pages() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        for id in 1..=5 {
            repo.add_node(ContentNode::new(id, Uuid::new_v4(), BaseType::Document, 10, "page"));
        }
        repo.add_node(ContentNode::new(6, Uuid::new_v4(), BaseType::Media, 10, "image"));
        repo
    }

    #[test]
    fn test_paging_is_stable() {
        let repo = repo_with_pages();
        let first = repo.nodes_of_types(BaseType::Document, &[10], 0, 2).unwrap();
        let last = repo.nodes_of_types(BaseType::Document, &[10], 2, 2).unwrap();

        assert_eq!(first.total, 5);
        assert_eq!(first.items.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(last.items.iter().map(|n| n.id).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_failing_save_leaves_node_untouched() {
        let repo = repo_with_pages();
        repo.fail_saves_of(BaseType::Document, 3);

        let node = repo.node(BaseType::Document, 3).unwrap().with_value("title", "x");
        assert!(repo.save_document(&node, false).is_err());
        assert_eq!(repo.node(BaseType::Document, 3).unwrap().value("title"), None);
        assert!(repo.saves().is_empty());
    }

    #[test]
    fn test_scope_release_is_counted() {
        let repo = InMemoryRepository::new();
        {
            let _scope = repo.begin().unwrap();
            assert_eq!(repo.open_scopes(), 1);
        }
        repo.begin().unwrap().commit().unwrap();

        assert_eq!(repo.open_scopes(), 0);
        assert_eq!(repo.scope_outcomes(), (1, 1));
    }
}
