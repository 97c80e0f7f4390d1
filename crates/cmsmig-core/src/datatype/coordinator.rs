//! Schema migration coordinator.
//!
//! Runs in three phases so no phase reads type metadata the previous phase
//! is still changing:
//!
//! 1. plan: find a migrator for every field type definition and stage
//!    those that need migrating, with their content migration if any;
//! 2. commit: rewrite each staged definition, dropping the staged content
//!    migration of any definition whose write failed;
//! 3. fan out: build one content mapper per schema type that declares, or
//!    inherits, a field backed by a staged definition.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::grid::GridElementRegistry;
use super::migrator::{DataTypeMigrator, MigratorContext};
use super::registry::MigratorRegistry;
use crate::content::{BaseType, ContentRepository, FieldTypeDefinition, SchemaGraph};
use crate::error::RepositoryError;
use crate::mapping::{ContentTransformMapper, ContentsByTypeSource, FieldMapping, TransformMapper};
use crate::transform::PropertyMigration;

/// Options for a coordinator run.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
    /// Keep tokens that are neither ids nor references.
    pub retain_invalid_data: bool,
    /// Only these field type definitions, by name. Empty means all.
    pub include: Vec<String>,
    /// Never these field type definitions, by name.
    pub exclude: Vec<String>,
    /// Forward save events to host handlers.
    pub raise_events: bool,
}

impl CoordinatorOptions {
    /// Set whether invalid tokens are kept.
    pub fn with_retain_invalid_data(mut self, retain: bool) -> Self {
        self.retain_invalid_data = retain;
        self
    }

    /// Restrict the run to the named definitions.
    pub fn with_include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = names.into_iter().map(Into::into).collect();
        self
    }

    /// Skip the named definitions.
    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether save events are raised.
    pub fn with_raise_events(mut self, raise_events: bool) -> Self {
        self.raise_events = raise_events;
        self
    }

    /// Whether a definition passes the include and exclude filters.
    pub fn admits(&self, name: &str) -> bool {
        let listed = |names: &[String]| names.iter().any(|n| n.eq_ignore_ascii_case(name));
        (self.include.is_empty() || listed(&self.include)) && !listed(&self.exclude)
    }
}

/// A definition whose migration has been planned.
#[derive(Clone)]
pub struct StagedMigration {
    /// The definition as it was before the run.
    pub definition: FieldTypeDefinition,
    /// Migration for content using the definition. `None` when only the
    /// definition itself changes.
    pub migration: Option<PropertyMigration>,
    migrator: Arc<dyn DataTypeMigrator>,
}

/// Staged migrations keyed by field type definition id.
pub type StagedPlan = BTreeMap<i64, StagedMigration>;

/// Plans and applies field type migrations, then builds content mappers.
pub struct SchemaMigrationCoordinator<'a> {
    repository: &'a dyn ContentRepository,
    migrators: &'a MigratorRegistry,
    grid_migrators: GridElementRegistry,
    options: CoordinatorOptions,
}

impl<'a> SchemaMigrationCoordinator<'a> {
    /// Create a coordinator with default options.
    pub fn new(repository: &'a dyn ContentRepository, migrators: &'a MigratorRegistry) -> Self {
        Self {
            repository,
            migrators,
            grid_migrators: GridElementRegistry::new(),
            options: CoordinatorOptions::default(),
        }
    }

    /// Set the run options.
    pub fn with_options(mut self, options: CoordinatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Grid element migrators used by grid definitions. Registrations made
    /// here before planning take precedence over discovered ones.
    pub fn grid_migrators(&self) -> &GridElementRegistry {
        &self.grid_migrators
    }

    fn ctx(&self) -> MigratorContext<'_> {
        MigratorContext {
            repository: self.repository,
            migrators: self.migrators,
            grid_migrators: &self.grid_migrators,
            retain_invalid_data: self.options.retain_invalid_data,
        }
    }

    /// Run all three phases and return the content mappers to execute.
    pub fn migrate(&self) -> Result<Vec<Box<dyn TransformMapper>>, RepositoryError> {
        let mut plan = self.plan()?;
        self.commit(&mut plan);
        self.fan_out(&plan)
    }

    /// Phase 1: stage each definition needing migration.
    pub fn plan(&self) -> Result<StagedPlan, RepositoryError> {
        let ctx = self.ctx();
        let mut plan = StagedPlan::new();

        for definition in self.repository.field_types()? {
            if !self.options.admits(&definition.name) {
                debug!(field_type = %definition.name, "Filtered out");
                continue;
            }
            let Some(migrator) = self.migrators.resolve(&definition.editor_alias) else {
                continue;
            };

            match migrator.needs_migration(&definition, &ctx) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    error!(
                        field_type = %definition.name,
                        editor_alias = %definition.editor_alias,
                        error = %e,
                        "Could not check whether data type needs migration"
                    );
                    continue;
                }
            }

            match migrator.property_migration(&definition, &ctx) {
                Ok(migration) => {
                    if migration.is_none() {
                        debug!(field_type = %definition.name, "No content migration, updating definition only");
                    }
                    plan.insert(
                        definition.id,
                        StagedMigration {
                            definition,
                            migration,
                            migrator,
                        },
                    );
                }
                Err(e) => error!(
                    field_type = %definition.name,
                    editor_alias = %definition.editor_alias,
                    error = %e,
                    "Could not build property migration"
                ),
            }
        }

        info!(staged = plan.len(), "Planned data type migrations");
        Ok(plan)
    }

    /// Phase 2: rewrite each staged definition.
    ///
    /// A definition that cannot be rewritten loses its staged content
    /// migration, so its content is left alone.
    pub fn commit(&self, plan: &mut StagedPlan) {
        let mut failed = Vec::new();

        for (id, staged) in plan.iter() {
            if let Err(e) = self.commit_one(staged) {
                error!(
                    field_type = %staged.definition.name,
                    old_alias = %staged.definition.editor_alias,
                    error = %e,
                    "Could not update data type"
                );
                failed.push(*id);
            }
        }

        for id in failed {
            plan.remove(&id);
        }
    }

    fn commit_one(&self, staged: &StagedMigration) -> Result<(), crate::Error> {
        let old = &staged.definition;
        let new_alias = staged.migrator.new_editor_alias(old).inspect_err(|e| {
            warn!(field_type = %old.name, error = %e, "Could not compute new editor alias");
        })?;
        let new_storage = staged.migrator.new_storage(old).inspect_err(|e| {
            warn!(field_type = %old.name, new_alias = %new_alias, error = %e, "Could not compute new storage");
        })?;
        let new_config = staged.migrator.new_config(old).inspect_err(|e| {
            warn!(field_type = %old.name, new_alias = %new_alias, error = %e, "Could not compute new configuration");
        })?;

        if new_alias == old.editor_alias
            && new_storage == old.storage
            && new_config.is_equivalent(&old.config)
        {
            debug!(field_type = %old.name, "Data type already up to date");
            return Ok(());
        }

        info!(
            "Updating data type {}, from {} to {}",
            old.name, old.editor_alias, new_alias
        );
        let mut updated = old.clone();
        updated.editor_alias = new_alias.clone();
        updated.storage = new_storage;
        updated.config = new_config;
        self.repository.save_field_type(&updated).inspect_err(|e| {
            warn!(field_type = %old.name, new_alias = %new_alias, error = %e, "Could not save data type");
        })?;
        Ok(())
    }

    /// Phase 3: one mapper per schema type with a field backed by a staged
    /// definition that has a content migration, including fields inherited through parents and
    /// compositions.
    pub fn fan_out(&self, plan: &StagedPlan) -> Result<Vec<Box<dyn TransformMapper>>, RepositoryError> {
        let mut mappers: Vec<Box<dyn TransformMapper>> = Vec::new();
        if plan.is_empty() {
            return Ok(mappers);
        }

        for base_type in BaseType::ALL {
            let types = match self.repository.schema_types(base_type) {
                Ok(types) => types,
                Err(e) => {
                    error!(%base_type, error = %e, "Could not load schema types");
                    continue;
                }
            };
            let graph = SchemaGraph::build(&types);
            let by_id: BTreeMap<i64, _> = types.iter().map(|t| (t.id, t)).collect();

            for schema in &types {
                let mut seen = HashSet::new();
                let mut mappings = Vec::new();
                for ancestor in graph.ancestors_of(schema.id) {
                    let Some(ancestor) = by_id.get(&ancestor) else {
                        continue;
                    };
                    for field in &ancestor.fields {
                        let Some(migration) = plan.get(&field.field_type_id).and_then(|s| s.migration.as_ref())
                        else {
                            continue;
                        };
                        if seen.insert(field.alias.to_ascii_lowercase()) {
                            mappings.push(FieldMapping::new(field.alias.clone(), migration.clone()));
                        }
                    }
                }

                if mappings.is_empty() {
                    continue;
                }
                debug!(%base_type, schema = %schema.alias, fields = mappings.len(), "Mapping content");
                let source = ContentsByTypeSource::exact(base_type, schema.alias.clone());
                mappers.push(Box::new(
                    ContentTransformMapper::new(Box::new(source), mappings)
                        .with_raise_events(self.options.raise_events),
                ));
            }
        }

        Ok(mappers)
    }
}
