//! Versioned product migrations.
//!
//! Hosts register [`MigrationUnit`]s in a [`UnitCatalog`], tagged with the
//! product they belong to and the version they bring it to. The
//! [`MigrationApplier`] asks each configured [`MigrationResolver`] for plans,
//! runs them with a [`PlanExecutor`] and records the versions reached.

pub mod applier;
pub mod error;
pub mod field_transform;
pub mod graph;
pub mod plan;
pub mod resolver;
pub mod store;
pub mod trigger;
pub mod unit;
pub mod version;

pub use applier::{AppliedProduct, ApplyReport, FailedProduct, MigrationApplier, ResolverFactory, ResolverRegistry};
pub use error::{MigrationError, ResolveError, StoreError};
pub use field_transform::{ExplicitMapping, FieldTransformMigration};
pub use graph::order_units;
pub use plan::{MigrationPlan, PlanExecutor, PlanStep};
pub use resolver::{MigrationResolver, ProductMigrationResolver, Resolution};
pub use store::{
    current_of, MemoryVersionStore, ScopeProvider, SledVersionStore, TransactionScope, VersionEntry, VersionStore,
};
pub use trigger::{ManualTrigger, TriggerError};
pub use unit::{
    CatalogEntry, MigrationContext, MigrationTag, MigrationUnit, TaggedMigration, UnitCatalog, UnitFactory, UnitId,
};
pub use version::{ParseVersionError, Version};
