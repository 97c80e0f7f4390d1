//! Resolvers turn registered units and recorded versions into plans.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::ResolveError;
use super::graph::order_units;
use super::plan::MigrationPlan;
use super::store::VersionStore;
use super::unit::UnitCatalog;
use super::version::Version;
use crate::config::{MigrationSettings, ResolverConfig, MONITORED_PRODUCT_NAMES};

/// What a resolver found for one product.
#[derive(Debug)]
pub enum Resolution {
    /// The product has pending steps.
    Pending(MigrationPlan),
    /// Nothing to do.
    UpToDate {
        /// Product name.
        product: String,
        /// Recorded version.
        version: Version,
    },
    /// The product could not be planned, either because its units could
    /// not be ordered or its recorded version could not be read.
    Failed {
        /// Product name.
        product: String,
        /// Why.
        error: ResolveError,
    },
}

/// Source of migration plans.
pub trait MigrationResolver: Send {
    /// Apply the resolver's configuration.
    fn initialize(&mut self, config: &ResolverConfig, settings: &MigrationSettings) -> Result<(), ResolveError>;

    /// Products this resolver looks after.
    fn product_names(&self) -> Vec<String>;

    /// Resolve every product against the recorded versions.
    ///
    /// An error here means the resolver as a whole could not run. Failures
    /// limited to one product are reported as [`Resolution::Failed`].
    fn resolve(&self, store: &dyn VersionStore) -> Result<Vec<Resolution>, ResolveError>;
}

/// Resolves the units of a [`UnitCatalog`] for a configured set of products.
pub struct ProductMigrationResolver {
    catalog: Arc<UnitCatalog>,
    products: Vec<String>,
}

impl ProductMigrationResolver {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "ProductMigrationResolver";

    /// Create a resolver monitoring no products until initialized.
    pub fn new(catalog: Arc<UnitCatalog>) -> Self {
        Self {
            catalog,
            products: Vec::new(),
        }
    }

    /// Monitor `products` directly, bypassing configuration.
    pub fn with_products<I, S>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.products = products.into_iter().map(Into::into).collect();
        self
    }

    fn resolve_product(&self, product: &str, store: &dyn VersionStore) -> Option<Resolution> {
        let units = self.catalog.for_product(product);
        let Some(target) = units.iter().map(|e| e.tag.target_version).max() else {
            debug!(product, "No migrations registered");
            return None;
        };
        let failed = |error: ResolveError| Resolution::Failed {
            product: product.to_string(),
            error,
        };

        let current = match store.current_version(product) {
            Ok(current) => current,
            Err(e) => {
                error!(product, error = %e, "Could not read the recorded version");
                return Some(failed(e.into()));
            }
        };

        if current >= target {
            info!("{product} is up to date");
            return Some(Resolution::UpToDate {
                product: product.to_string(),
                version: current,
            });
        }

        info!("{product} has migrations from {current} to {target}");
        let ordered = match order_units(product, &units, &self.catalog) {
            Ok(ordered) => ordered,
            Err(e) => {
                error!(product, error = %e, "Could not order migrations");
                return Some(failed(e));
            }
        };

        let plan = ordered
            .into_iter()
            .filter(|e| e.tag.target_version > current)
            .fold(MigrationPlan::new(product, current, target), |plan, e| {
                plan.with_step(e.tag.target_version, e.id.short_name(), e.instantiate())
            });
        Some(Resolution::Pending(plan))
    }
}

impl MigrationResolver for ProductMigrationResolver {
    fn initialize(&mut self, config: &ResolverConfig, settings: &MigrationSettings) -> Result<(), ResolveError> {
        let Some(names) = config.settings.monitored_product_names() else {
            warn!(
                resolver = %config.name,
                "No {MONITORED_PRODUCT_NAMES} setting, no products will be migrated"
            );
            self.products.clear();
            return Ok(());
        };

        self.products.clear();
        for name in names {
            if name.eq_ignore_ascii_case(&settings.platform_product_name) {
                warn!(resolver = %config.name, product = %name, "Platform product cannot be monitored");
                continue;
            }
            if !self.products.iter().any(|p| p.eq_ignore_ascii_case(&name)) {
                self.products.push(name);
            }
        }
        info!("Looking for migrations in products: {}", self.products.join(", "));
        Ok(())
    }

    fn product_names(&self) -> Vec<String> {
        self.products.clone()
    }

    fn resolve(&self, store: &dyn VersionStore) -> Result<Vec<Resolution>, ResolveError> {
        Ok(self
            .products
            .iter()
            .filter_map(|product| self.resolve_product(product, store))
            .collect())
    }
}
