//! Migration units and the catalog they are registered in.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use super::error::MigrationError;
use super::version::Version;
use crate::content::ContentRepository;
use crate::datatype::{CoordinatorOptions, MigratorRegistry};
use crate::transform::{Direction, ReferenceCache, TransformContext};

/// What a unit can use while it runs.
#[derive(Clone, Copy)]
pub struct MigrationContext<'a> {
    /// Host repository.
    pub repository: &'a dyn ContentRepository,
    /// Identity cache shared by every unit of one applier run.
    pub cache: &'a ReferenceCache,
    /// Data type migrators.
    pub migrators: &'a MigratorRegistry,
    /// Keep tokens that are neither ids nor references.
    pub retain_invalid_data: bool,
    /// Forward save events to host handlers.
    pub raise_events: bool,
}

impl<'a> MigrationContext<'a> {
    /// Context for property transforms.
    pub fn transform_context(&self) -> TransformContext<'a> {
        TransformContext::new(self.repository, self.cache)
    }

    /// Coordinator options matching this context.
    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions::default()
            .with_retain_invalid_data(self.retain_invalid_data)
            .with_raise_events(self.raise_events)
    }
}

/// One reversible step of a product's evolution.
pub trait MigrationUnit: Send + Sync {
    /// Apply the step.
    fn up(&self, ctx: &MigrationContext<'_>) -> Result<(), MigrationError>;

    /// Revert the step. Unsupported unless overridden.
    fn down(&self, _ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
        Err(MigrationError::Unsupported {
            unit: "unit".to_string(),
            direction: Direction::Downgrade,
        })
    }
}

/// Identity of a unit type.
#[derive(Clone, Copy)]
pub struct UnitId {
    type_id: TypeId,
    name: &'static str,
}

impl UnitId {
    /// Identity of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Full type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for UnitId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for UnitId {}

impl Hash for UnitId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Declares which product a unit belongs to and what it brings it to.
#[derive(Debug, Clone)]
pub struct MigrationTag {
    /// Product name.
    pub product: String,
    /// Version the product is at once the unit has run.
    pub target_version: Version,
    /// Units of the same product that must run first.
    pub depends_on: Vec<UnitId>,
}

impl MigrationTag {
    /// Tag a unit for `product` at `target_version`.
    pub fn new(product: impl Into<String>, target_version: Version) -> Self {
        Self {
            product: product.into(),
            target_version,
            depends_on: Vec::new(),
        }
    }

    /// Require `T` to run first.
    pub fn after<T: 'static>(mut self) -> Self {
        self.depends_on.push(UnitId::of::<T>());
        self
    }
}

/// A unit type that carries its own tag.
pub trait TaggedMigration: MigrationUnit + Default + 'static {
    /// The unit's tag.
    fn tag() -> MigrationTag;
}

/// Builds a unit instance.
pub type UnitFactory = Arc<dyn Fn() -> Arc<dyn MigrationUnit> + Send + Sync>;

/// A registered unit.
#[derive(Clone)]
pub struct CatalogEntry {
    /// Unit identity.
    pub id: UnitId,
    /// Unit tag.
    pub tag: MigrationTag,
    factory: UnitFactory,
}

impl CatalogEntry {
    /// Build an instance of the unit.
    pub fn instantiate(&self) -> Arc<dyn MigrationUnit> {
        (self.factory)()
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .finish()
    }
}

/// Every migration unit known to the process.
///
/// Hosts register their units once at startup; resolvers read from it.
#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<UnitId, usize>,
}

impl UnitCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tagged unit type. Registering a type twice replaces it.
    pub fn register<T: TaggedMigration>(&mut self) -> &mut Self {
        self.register_with(UnitId::of::<T>(), T::tag(), || Arc::new(T::default()))
    }

    /// Register a unit with an explicit tag and factory.
    pub fn register_with<F>(&mut self, id: UnitId, tag: MigrationTag, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn MigrationUnit> + Send + Sync + 'static,
    {
        debug!(unit = %id, product = %tag.product, version = %tag.target_version, "Registered migration");
        let entry = CatalogEntry {
            id,
            tag,
            factory: Arc::new(factory),
        };
        match self.index.get(&id) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.index.insert(id, self.entries.len());
                self.entries.push(entry);
            }
        }
        self
    }

    /// Look up a unit.
    pub fn get(&self, id: &UnitId) -> Option<&CatalogEntry> {
        self.index.get(id).map(|&idx| &self.entries[idx])
    }

    /// Every unit, in registration order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Units of one product, in registration order. Case-insensitive.
    pub fn for_product(&self, product: &str) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.tag.product.eq_ignore_ascii_case(product))
            .collect()
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
