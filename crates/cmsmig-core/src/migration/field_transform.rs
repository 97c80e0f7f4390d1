//! A migration unit that rewrites content field values.
//!
//! In discovery mode the unit asks the [`SchemaMigrationCoordinator`] which
//! field type definitions need migrating and rewrites the content using
//! them. In explicit mode it rewrites a fixed list of fields between
//! integer ids and references.

use std::sync::Arc;

use tracing::info;

use super::error::MigrationError;
use super::unit::{MigrationContext, MigrationUnit};
use crate::content::BaseType;
use crate::datatype::SchemaMigrationCoordinator;
use crate::mapping::{ContentTransformMapper, ContentsByTypeSource, FieldMapping, TransformMapper, TransformReport, TransformRunner};
use crate::transform::{Direction, IdToReferenceTransform, PropertyMigration, ReferenceToIdTransform};

/// One field rewritten between ids and references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitMapping {
    /// Base type of the content holding the field.
    pub base_type: BaseType,
    /// Schema type alias. Descendant types are included.
    pub schema_alias: String,
    /// Field alias.
    pub field: String,
    /// Base type of the nodes the field points at.
    pub target: BaseType,
}

impl ExplicitMapping {
    /// Create a mapping.
    pub fn new(
        base_type: BaseType,
        schema_alias: impl Into<String>,
        field: impl Into<String>,
        target: BaseType,
    ) -> Self {
        Self {
            base_type,
            schema_alias: schema_alias.into(),
            field: field.into(),
            target,
        }
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Discovery { include: Vec<String>, exclude: Vec<String> },
    Explicit(Vec<ExplicitMapping>),
}

/// Rewrites content fields when run as a migration unit.
#[derive(Debug, Clone)]
pub struct FieldTransformMigration {
    mode: Mode,
}

impl Default for FieldTransformMigration {
    fn default() -> Self {
        Self::discovery()
    }
}

impl FieldTransformMigration {
    /// Migrate every field type definition a registered migrator handles.
    pub fn discovery() -> Self {
        Self {
            mode: Mode::Discovery {
                include: Vec::new(),
                exclude: Vec::new(),
            },
        }
    }

    /// Rewrite exactly the given fields.
    pub fn explicit(mappings: Vec<ExplicitMapping>) -> Self {
        Self {
            mode: Mode::Explicit(mappings),
        }
    }

    /// Only migrate definitions with these names. Ignored in explicit mode.
    pub fn with_include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Mode::Discovery { include, .. } = &mut self.mode {
            include.extend(names.into_iter().map(Into::into));
        }
        self
    }

    /// Never migrate definitions with these names. Ignored in explicit mode.
    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Mode::Discovery { exclude, .. } = &mut self.mode {
            exclude.extend(names.into_iter().map(Into::into));
        }
        self
    }

    /// Run in `direction` and return the report.
    pub fn run(&self, ctx: &MigrationContext<'_>, direction: Direction) -> Result<TransformReport, MigrationError> {
        let mappers = match &self.mode {
            Mode::Discovery { include, exclude } => {
                if direction == Direction::Downgrade {
                    return Err(MigrationError::Unsupported {
                        unit: "FieldTransformMigration".to_string(),
                        direction,
                    });
                }
                let options = ctx
                    .coordinator_options()
                    .with_include(include.iter().cloned())
                    .with_exclude(exclude.iter().cloned());
                SchemaMigrationCoordinator::new(ctx.repository, ctx.migrators)
                    .with_options(options)
                    .migrate()?
            }
            Mode::Explicit(mappings) => Self::explicit_mappers(mappings, ctx),
        };

        info!(mappers = mappers.len(), %direction, "Transforming content");
        Ok(TransformRunner::new(ctx.transform_context()).run(&mappers, direction))
    }

    fn explicit_mappers(mappings: &[ExplicitMapping], ctx: &MigrationContext<'_>) -> Vec<Box<dyn TransformMapper>> {
        mappings
            .iter()
            .map(|m| {
                let migration = PropertyMigration::new(
                    Arc::new(IdToReferenceTransform::new(m.target, ctx.retain_invalid_data)),
                    Arc::new(ReferenceToIdTransform::new()),
                );
                let source = ContentsByTypeSource::new(m.base_type, m.schema_alias.clone());
                Box::new(
                    ContentTransformMapper::new(Box::new(source), vec![FieldMapping::new(m.field.clone(), migration)])
                        .with_raise_events(ctx.raise_events),
                ) as Box<dyn TransformMapper>
            })
            .collect()
    }
}

impl MigrationUnit for FieldTransformMigration {
    fn up(&self, ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        self.run(ctx, Direction::Upgrade).map(|_| ())
    }

    fn down(&self, ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        self.run(ctx, Direction::Downgrade).map(|_| ())
    }
}
