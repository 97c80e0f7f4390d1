//! Field type definition migration.
//!
//! A [`DataTypeMigrator`] decides how one kind of field type definition
//! changes and how content using it is rewritten. The
//! [`SchemaMigrationCoordinator`] applies those decisions across the
//! repository.

pub mod archetype;
pub mod coordinator;
pub mod grid;
pub mod json_content;
pub mod migrator;
pub mod nested;
pub mod pickers;
pub mod recoding;
pub mod registry;

pub use archetype::{ArchetypeMigrator, ARCHETYPE_ALIAS};
pub use coordinator::{CoordinatorOptions, StagedPlan, SchemaMigrationCoordinator, StagedMigration};
pub use grid::{
    DocTypeMigrator, GenericEditorMigrator, GridElementFactory, GridElementMigrator,
    GridElementRegistry, GridMigrator,
};
pub use json_content::{multi_url_picker, related_links, JsonContentMigrator};
pub use migrator::{nested_migration, DataTypeMigrator, MigratorContext, MigratorError};
pub use nested::{NestedContentMigrator, LEGACY_NESTED_CONTENT_ALIAS, NESTED_CONTENT_ALIAS};
pub use pickers::{ConfigRule, ReferencePickerMigrator, ReferenceTarget};
pub use recoding::{google_maps, nu_picker, RecodingMigrator};
pub use registry::{alias_by_convention, MigratorFactory, MigratorRegistry};
