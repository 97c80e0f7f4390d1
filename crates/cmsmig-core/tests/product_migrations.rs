mod common;

use std::sync::Arc;

use cmsmig_core::config::{MigrationSettings, ResolverConfig, ResolverSettings, MONITORED_PRODUCT_NAMES};
use cmsmig_core::migration::{
    AppliedProduct, MemoryVersionStore, MigrationApplier, MigrationTag, ProductMigrationResolver, ResolverRegistry,
    SledVersionStore, UnitCatalog, UnitId, Version, VersionEntry, VersionStore,
};
use common::{LoggingUnit, TestContext};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

type Log = Arc<Mutex<Vec<&'static str>>>;

struct V110;
struct V130;
struct V140;
struct Prerequisite;
struct Dependent;
struct Breaks;
struct BlogInit;

fn register(catalog: &mut UnitCatalog, log: &Log, id: UnitId, tag: MigrationTag, fail: bool) {
    let log = Arc::clone(log);
    let name = id.short_name();
    catalog.register_with(id, tag, move || {
        Arc::new(LoggingUnit {
            name,
            log: Arc::clone(&log),
            fail,
        })
    });
}

fn settings(products: &str) -> MigrationSettings {
    MigrationSettings::default().with_resolver(
        ResolverConfig::new("products", ProductMigrationResolver::TYPE_NAME)
            .with_settings(ResolverSettings::new().with(MONITORED_PRODUCT_NAMES, products)),
    )
}

fn shop_catalog(log: &Log) -> UnitCatalog {
    let mut catalog = UnitCatalog::new();
    register(&mut catalog, log, UnitId::of::<V140>(), MigrationTag::new("shop", Version::new(1, 4, 0)), false);
    register(&mut catalog, log, UnitId::of::<V110>(), MigrationTag::new("shop", Version::new(1, 1, 0)), false);
    register(&mut catalog, log, UnitId::of::<V130>(), MigrationTag::new("shop", Version::new(1, 3, 0)), false);
    catalog
}

#[test]
fn test_only_units_above_recorded_version_run() {
    let tc = TestContext::new();
    let log = Log::default();
    let resolvers = ResolverRegistry::with_defaults(Arc::new(shop_catalog(&log)));
    let store = MemoryVersionStore::new();
    store.record(&VersionEntry::new("shop", Version::new(1, 2, 0))).unwrap();

    let report = MigrationApplier::new(&tc.repo, &tc.repo, &store, &resolvers, &tc.migrators)
        .with_settings(settings("shop"))
        .apply();

    assert_eq!(*log.lock(), vec!["V130", "V140"]);
    assert_eq!(
        report.applied,
        vec![AppliedProduct {
            product: "shop".into(),
            from: Version::new(1, 2, 0),
            to: Version::new(1, 4, 0),
        }]
    );
    assert_eq!(store.current_version("shop").unwrap(), Version::new(1, 4, 0));
    assert_eq!(tc.repo.scope_outcomes(), (1, 0));
}

#[test]
fn test_prerequisite_runs_first() {
    let tc = TestContext::new();
    let log = Log::default();
    let mut catalog = UnitCatalog::new();
    register(
        &mut catalog,
        &log,
        UnitId::of::<Dependent>(),
        MigrationTag::new("shop", Version::new(1, 0, 0)).after::<Prerequisite>(),
        false,
    );
    register(
        &mut catalog,
        &log,
        UnitId::of::<Prerequisite>(),
        MigrationTag::new("shop", Version::new(1, 1, 0)),
        false,
    );
    let resolvers = ResolverRegistry::with_defaults(Arc::new(catalog));
    let store = MemoryVersionStore::new();

    MigrationApplier::new(&tc.repo, &tc.repo, &store, &resolvers, &tc.migrators)
        .with_settings(settings("shop"))
        .apply();

    assert_eq!(*log.lock(), vec!["Prerequisite", "Dependent"]);
    assert_eq!(store.current_version("shop").unwrap(), Version::new(1, 1, 0));
}

#[test]
fn test_failed_product_keeps_version_and_others_proceed() {
    let tc = TestContext::new();
    let log = Log::default();
    let mut catalog = shop_catalog(&log);
    register(&mut catalog, &log, UnitId::of::<Breaks>(), MigrationTag::new("shop", Version::new(1, 5, 0)), true);
    register(&mut catalog, &log, UnitId::of::<BlogInit>(), MigrationTag::new("blog", Version::new(0, 1, 0)), false);
    let resolvers = ResolverRegistry::with_defaults(Arc::new(catalog));
    let store = MemoryVersionStore::new();

    let report = MigrationApplier::new(&tc.repo, &tc.repo, &store, &resolvers, &tc.migrators)
        .with_settings(settings("shop,blog"))
        .apply();

    assert_eq!(*log.lock(), vec!["V110", "V130", "V140", "Breaks", "BlogInit"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].product, "shop");
    assert_eq!(store.current_version("shop").unwrap(), Version::ZERO);
    assert_eq!(store.current_version("blog").unwrap(), Version::new(0, 1, 0));
    assert_eq!(tc.repo.scope_outcomes(), (1, 1));
    assert_eq!(tc.repo.open_scopes(), 0);
}

#[test]
fn test_recorded_versions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let tc = TestContext::new();
    let log = Log::default();
    let resolvers = ResolverRegistry::with_defaults(Arc::new(shop_catalog(&log)));

    {
        let db = sled::open(dir.path()).unwrap();
        let store = SledVersionStore::open(&db).unwrap();
        let report = MigrationApplier::new(&tc.repo, &tc.repo, &store, &resolvers, &tc.migrators)
            .with_settings(settings("shop"))
            .apply();
        assert_eq!(report.applied.len(), 1);
    }

    let db = sled::open(dir.path()).unwrap();
    let store = SledVersionStore::open(&db).unwrap();
    assert_eq!(store.current_version("SHOP").unwrap(), Version::new(1, 4, 0));

    let report = MigrationApplier::new(&tc.repo, &tc.repo, &store, &resolvers, &tc.migrators)
        .with_settings(settings("shop"))
        .apply();
    assert!(report.applied.is_empty());
    assert_eq!(report.up_to_date, vec!["shop"]);
    assert_eq!(log.lock().len(), 3);
}

#[test]
fn test_store_on_shared_database() {
    let tc = TestContext::new();
    let store = SledVersionStore::open(&tc.db).unwrap();
    store.record(&VersionEntry::new("shop", Version::new(3, 1, 0))).unwrap();
    assert_eq!(store.current_version("shop").unwrap(), Version::new(3, 1, 0));
}
