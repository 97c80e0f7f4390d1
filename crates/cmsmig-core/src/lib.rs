//! cmsmig Core - content migration engine for tree-structured CMS content.
//!
//! This crate rewrites stored field values between integer ids and global
//! references, migrates field type definitions together with the content
//! using them, and runs versioned per-product migration units.

pub mod config;
pub mod content;
pub mod datatype;
pub mod error;
pub mod mapping;
pub mod migration;
pub mod transform;

pub use config::{ConfigError, MigrationSettings, ResolverConfig, ResolverSettings};
pub use content::{
    BaseType, ContentNode, ContentRepository, FieldTypeConfig, FieldTypeDefinition, GlobalReference,
    InMemoryRepository, SchemaType, StorageKind,
};
pub use datatype::{
    CoordinatorOptions, DataTypeMigrator, GridElementMigrator, MigratorRegistry, SchemaMigrationCoordinator,
};
pub use error::{Error, RepositoryError, Result};
pub use mapping::{
    ContentSource, ContentTransformMapper, ContentsByTypeSource, FieldMapping, TransformMapper, TransformReport,
    TransformRunner,
};
pub use migration::{
    ApplyReport, FieldTransformMigration, ManualTrigger, MigrationApplier, MigrationError, MigrationTag,
    MigrationUnit, PlanExecutor, ProductMigrationResolver, ResolveError, ResolverRegistry, SledVersionStore,
    StoreError, TaggedMigration, UnitCatalog, Version, VersionStore,
};
pub use transform::{
    Direction, IdToReferenceTransform, PropertyMigration, PropertyTransform, ReferenceCache, ReferenceToIdTransform,
    TransformError,
};
