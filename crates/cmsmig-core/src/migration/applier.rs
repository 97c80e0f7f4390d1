//! Top-level entry point that applies every due migration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::plan::{MigrationPlan, PlanExecutor};
use super::resolver::{MigrationResolver, ProductMigrationResolver, Resolution};
use super::store::{ScopeProvider, VersionStore};
use super::unit::{MigrationContext, UnitCatalog};
use super::version::Version;
use crate::config::MigrationSettings;
use crate::content::ContentRepository;
use crate::datatype::MigratorRegistry;
use crate::transform::ReferenceCache;

/// Builds a resolver instance.
pub type ResolverFactory = Arc<dyn Fn() -> Box<dyn MigrationResolver> + Send + Sync>;

/// Resolver types available to configuration, keyed by type name.
#[derive(Default, Clone)]
pub struct ResolverRegistry {
    factories: HashMap<String, ResolverFactory>,
}

impl ResolverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the product resolver over `catalog`.
    pub fn with_defaults(catalog: Arc<UnitCatalog>) -> Self {
        let mut registry = Self::new();
        registry.register(ProductMigrationResolver::TYPE_NAME, move || {
            Box::new(ProductMigrationResolver::new(Arc::clone(&catalog)))
        });
        registry
    }

    /// Register a resolver type.
    pub fn register<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn() -> Box<dyn MigrationResolver> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.to_lowercase(), Arc::new(factory));
    }

    /// Build a resolver by type name.
    ///
    /// Qualified names such as `Vendor.Migrations.ProductMigrationResolver,
    /// Vendor.Migrations` fall back to their final segment.
    pub fn create(&self, type_name: &str) -> Option<Box<dyn MigrationResolver>> {
        let key = type_name.trim().to_lowercase();
        if let Some(factory) = self.factories.get(&key) {
            return Some(factory());
        }
        let short = key
            .split(',')
            .next()
            .and_then(|qualified| qualified.trim().rsplit(['.', ':']).next())
            .unwrap_or_default();
        self.factories.get(short).map(|factory| factory())
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A product brought to a new version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedProduct {
    /// Product name.
    pub product: String,
    /// Version before the run.
    pub from: Version,
    /// Version recorded by the run.
    pub to: Version,
}

/// A product whose migration did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedProduct {
    /// Product name.
    pub product: String,
    /// Why.
    pub reason: String,
}

/// Outcome of one applier run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Products migrated.
    pub applied: Vec<AppliedProduct>,
    /// Products with nothing to do.
    pub up_to_date: Vec<String>,
    /// Products that failed to resolve or execute.
    pub failed: Vec<FailedProduct>,
    /// Configured resolvers that contributed nothing.
    pub resolvers_skipped: Vec<String>,
}

impl ApplyReport {
    /// Whether nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.resolvers_skipped.is_empty()
    }
}

/// Applies every due migration of every configured resolver.
///
/// Resolvers are all consulted before any plan runs. A resolver that fails
/// to build, initialize or resolve is skipped and the rest still run. Each
/// plan runs in its own transactional scope.
pub struct MigrationApplier<'a> {
    repository: &'a dyn ContentRepository,
    scopes: &'a dyn ScopeProvider,
    store: &'a dyn VersionStore,
    resolvers: &'a ResolverRegistry,
    migrators: &'a MigratorRegistry,
    settings: MigrationSettings,
}

impl<'a> MigrationApplier<'a> {
    /// Create an applier with default settings.
    pub fn new(
        repository: &'a dyn ContentRepository,
        scopes: &'a dyn ScopeProvider,
        store: &'a dyn VersionStore,
        resolvers: &'a ResolverRegistry,
        migrators: &'a MigratorRegistry,
    ) -> Self {
        Self {
            repository,
            scopes,
            store,
            resolvers,
            migrators,
            settings: MigrationSettings::default(),
        }
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: MigrationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The applier's settings.
    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    /// Apply migrations if the host runs them at startup.
    pub fn run_at_startup(&self) -> Option<ApplyReport> {
        if !self.settings.run_at_startup {
            info!("Migrations at startup are disabled");
            return None;
        }
        Some(self.apply())
    }

    /// Apply every due migration now.
    pub fn apply(&self) -> ApplyReport {
        let mut report = ApplyReport::default();
        let plans = self.collect_plans(&mut report);

        let cache = ReferenceCache::new();
        let ctx = MigrationContext {
            repository: self.repository,
            cache: &cache,
            migrators: self.migrators,
            retain_invalid_data: self.settings.retain_invalid_data,
            raise_events: self.settings.raise_events,
        };
        let executor = PlanExecutor::new(self.scopes, self.store);

        for plan in plans {
            info!("Executing migration for {} from {} to {}", plan.product, plan.from, plan.to);
            match executor.execute(&plan, &ctx) {
                Ok(to) => {
                    info!("Completed migration for {} from {} to {}", plan.product, plan.from, to);
                    report.applied.push(AppliedProduct {
                        product: plan.product,
                        from: plan.from,
                        to,
                    });
                }
                Err(e) => {
                    error!(error = %e, "Could not execute the migration of {} from {} to {}", plan.product, plan.from, plan.to);
                    report.failed.push(FailedProduct {
                        product: plan.product,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            applied = report.applied.len(),
            up_to_date = report.up_to_date.len(),
            failed = report.failed.len(),
            resolvers_skipped = report.resolvers_skipped.len(),
            "Migration run finished"
        );
        report
    }

    fn collect_plans(&self, report: &mut ApplyReport) -> Vec<MigrationPlan> {
        let mut plans = Vec::new();

        for config in &self.settings.resolvers {
            let Some(mut resolver) = self.resolvers.create(&config.type_name) else {
                warn!(resolver = %config.name, type_name = %config.type_name, "Unknown resolver type");
                report.resolvers_skipped.push(config.name.clone());
                continue;
            };
            if let Err(e) = resolver.initialize(config, &self.settings) {
                error!(resolver = %config.name, error = %e, "Could not initialize resolver");
                report.resolvers_skipped.push(config.name.clone());
                continue;
            }

            let resolutions = match resolver.resolve(self.store) {
                Ok(resolutions) => resolutions,
                Err(e) => {
                    error!(resolver = %config.name, error = %e, "Could not resolve migrations");
                    report.resolvers_skipped.push(config.name.clone());
                    continue;
                }
            };

            for resolution in resolutions {
                match resolution {
                    Resolution::Pending(plan) => plans.push(plan),
                    Resolution::UpToDate { product, .. } => report.up_to_date.push(product),
                    Resolution::Failed { product, error } => report.failed.push(FailedProduct {
                        product,
                        reason: error.to_string(),
                    }),
                }
            }
        }

        plans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResolverConfig, ResolverSettings, MONITORED_PRODUCT_NAMES};
    use crate::content::InMemoryRepository;
    use crate::migration::error::{MigrationError, ResolveError};
    use crate::migration::store::MemoryVersionStore;
    use crate::migration::unit::{MigrationTag, MigrationUnit, UnitId};

    struct Noop;

    impl MigrationUnit for Noop {
        fn up(&self, _ctx: &MigrationContext<'_>) -> Result<(), MigrationError> {
            Ok(())
        }
    }

    struct Broken;

    impl MigrationResolver for Broken {
        fn initialize(&mut self, _config: &ResolverConfig, _settings: &MigrationSettings) -> Result<(), ResolveError> {
            Err(ResolveError::InvalidSetting {
                key: "x".into(),
                reason: "bad".into(),
            })
        }

        fn product_names(&self) -> Vec<String> {
            Vec::new()
        }

        fn resolve(&self, _store: &dyn VersionStore) -> Result<Vec<Resolution>, ResolveError> {
            Ok(Vec::new())
        }
    }

    struct ShopUnit;

    fn settings() -> MigrationSettings {
        MigrationSettings::default()
            .with_resolver(ResolverConfig::new("missing", "NoSuchResolver"))
            .with_resolver(ResolverConfig::new("broken", "Broken"))
            .with_resolver(
                ResolverConfig::new("products", "Acme.Migrations.ProductMigrationResolver, Acme.Migrations")
                    .with_settings(ResolverSettings::new().with(MONITORED_PRODUCT_NAMES, "shop")),
            )
    }

    #[test]
    fn test_bad_resolvers_do_not_stop_the_run() {
        let mut catalog = UnitCatalog::new();
        catalog.register_with(UnitId::of::<ShopUnit>(), MigrationTag::new("shop", Version::new(1, 0, 0)), || {
            Arc::new(Noop)
        });
        let mut resolvers = ResolverRegistry::with_defaults(Arc::new(catalog));
        resolvers.register("Broken", || Box::new(Broken));

        let repo = InMemoryRepository::new();
        let store = MemoryVersionStore::new();
        let migrators = MigratorRegistry::new();
        let applier = MigrationApplier::new(&repo, &repo, &store, &resolvers, &migrators).with_settings(settings());

        let report = applier.apply();
        assert_eq!(report.resolvers_skipped, vec!["missing", "broken"]);
        assert_eq!(
            report.applied,
            vec![AppliedProduct {
                product: "shop".into(),
                from: Version::ZERO,
                to: Version::new(1, 0, 0),
            }]
        );
        assert!(!report.is_success());

        let again = applier.apply();
        assert!(again.applied.is_empty());
        assert_eq!(again.up_to_date, vec!["shop"]);
    }

    #[test]
    fn test_startup_run_can_be_disabled() {
        let resolvers = ResolverRegistry::new();
        let repo = InMemoryRepository::new();
        let store = MemoryVersionStore::new();
        let migrators = MigratorRegistry::new();
        let applier = MigrationApplier::new(&repo, &repo, &store, &resolvers, &migrators)
            .with_settings(MigrationSettings::default().with_run_at_startup(false));

        assert!(applier.run_at_startup().is_none());
        assert_eq!(repo.scope_outcomes(), (0, 0));
    }
}
