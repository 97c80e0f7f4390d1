//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use cmsmig_core::content::{BaseType, ContentNode, InMemoryRepository};
use cmsmig_core::datatype::MigratorRegistry;
use cmsmig_core::mapping::{ContentTransformMapper, ContentsByTypeSource, FieldMapping, TransformMapper};
use cmsmig_core::migration::{MigrationContext, MigrationError, MigrationUnit};
use cmsmig_core::transform::{
    IdToReferenceTransform, PropertyMigration, ReferenceCache, ReferenceToIdTransform, TransformContext,
};
use cmsmig_core::GlobalReference;
use parking_lot::Mutex;
use uuid::Uuid;

/// Repository, cache and migrators for one test.
pub struct TestContext {
    pub repo: InMemoryRepository,
    pub cache: ReferenceCache,
    pub migrators: MigratorRegistry,
    pub db: sled::Db,
    pub retain_invalid_data: bool,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            repo: InMemoryRepository::new(),
            cache: ReferenceCache::new(),
            migrators: MigratorRegistry::with_defaults(),
            db: sled::Config::new()
                .temporary(true)
                .open()
                .expect("temporary sled db"),
            retain_invalid_data: false,
        }
    }

    pub fn with_retain_invalid_data(mut self, retain: bool) -> Self {
        self.retain_invalid_data = retain;
        self
    }

    pub fn ctx(&self) -> MigrationContext<'_> {
        MigrationContext {
            repository: &self.repo,
            cache: &self.cache,
            migrators: &self.migrators,
            retain_invalid_data: self.retain_invalid_data,
            raise_events: false,
        }
    }

    pub fn transform_ctx(&self) -> TransformContext<'_> {
        TransformContext::new(&self.repo, &self.cache)
    }

    /// Add a document and return its key.
    pub fn add_document(&self, id: i64, schema_id: i64, schema_alias: &str) -> Uuid {
        let key = Uuid::new_v4();
        self.repo
            .add_node(ContentNode::new(id, key, BaseType::Document, schema_id, schema_alias));
        key
    }

    pub fn value(&self, base_type: BaseType, id: i64, field: &str) -> Option<String> {
        self.repo
            .node(base_type, id)
            .and_then(|n| n.value(field).map(str::to_string))
    }

    pub fn reference(&self, base_type: BaseType, id: i64) -> String {
        let key = self.repo.node(base_type, id).expect("node exists").key;
        GlobalReference::new(base_type, key).to_string()
    }
}

/// Mapper rewriting `field` of documents of `alias` between ids and references.
pub fn id_reference_mapper(alias: &str, field: &str, retain: bool) -> Box<dyn TransformMapper> {
    let migration = PropertyMigration::new(
        Arc::new(IdToReferenceTransform::new(BaseType::Document, retain)),
        Arc::new(ReferenceToIdTransform::new()),
    );
    Box::new(ContentTransformMapper::new(
        Box::new(ContentsByTypeSource::new(BaseType::Document, alias)),
        vec![FieldMapping::new(field, migration)],
    ))
}

/// Unit that appends its name to a shared log.
pub struct LoggingUnit {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<&'static str>>>,
    pub fail: bool,
}

impl MigrationUnit for LoggingUnit {
    fn up(&self, _ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        self.log.lock().push(self.name);
        if self.fail {
            return Err(MigrationError::UnitFailed {
                unit: self.name.to_string(),
                version: String::new(),
                reason: "failed on purpose".to_string(),
            });
        }
        Ok(())
    }
}
