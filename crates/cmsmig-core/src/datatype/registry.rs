//! Registration table mapping editor aliases to migrators.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::archetype::{ArchetypeMigrator, ARCHETYPE_ALIAS};
use super::grid::GridMigrator;
use super::json_content::{multi_url_picker, related_links};
use super::migrator::DataTypeMigrator;
use super::nested::{NestedContentMigrator, LEGACY_NESTED_CONTENT_ALIAS};
use super::pickers::ReferencePickerMigrator;
use super::recoding::{google_maps, nu_picker};

/// Builds a migrator instance.
pub type MigratorFactory = Arc<dyn Fn() -> Arc<dyn DataTypeMigrator> + Send + Sync>;

const CONVENTION_SUFFIXES: [&str; 2] = ["DataTypeMigrator", "Migrator"];

const NU_PICKER_ALIASES: [&str; 3] = [
    "nuPickers.EnumDropDownPicker",
    "nuPickers.DotNetCheckBoxPicker",
    "nuPickers.DotNetDropDownPicker",
];

/// Infer an editor alias from a migrator type name.
///
/// `FooDataTypeMigrator` and `FooMigrator` both map to `Foo`. Module paths
/// are ignored. Returns `None` when neither suffix matches or nothing is
/// left after trimming.
pub fn alias_by_convention(type_name: &str) -> Option<&str> {
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    CONVENTION_SUFFIXES
        .iter()
        .find_map(|suffix| short.strip_suffix(suffix))
        .filter(|alias| !alias.is_empty())
}

/// Resolves data type migrators by editor alias, ignoring ASCII case.
///
/// Each alias is resolved once; both hits and misses are remembered until
/// the alias is registered again.
#[derive(Default)]
pub struct MigratorRegistry {
    factories: HashMap<String, MigratorFactory>,
    resolved: Mutex<HashMap<String, Option<Arc<dyn DataTypeMigrator>>>>,
}

impl MigratorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in migrators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("Umbraco.ContentPickerAlias", || {
            Arc::new(ReferencePickerMigrator::content_picker())
        });
        registry.register("Umbraco.MediaPicker", || {
            Arc::new(ReferencePickerMigrator::media_picker())
        });
        registry.register("Umbraco.MultipleMediaPicker", || {
            Arc::new(ReferencePickerMigrator::multiple_media_picker())
        });
        registry.register("Umbraco.MemberPicker", || {
            Arc::new(ReferencePickerMigrator::member_picker())
        });
        registry.register("Umbraco.MultiNodeTreePicker", || {
            Arc::new(ReferencePickerMigrator::tree_picker())
        });
        registry.register("Umbraco.RelatedLinks", || Arc::new(related_links()));
        registry.register("RJP.MultiUrlPicker", || Arc::new(multi_url_picker()));
        registry.register("Umbraco.Grid", || Arc::new(GridMigrator::new()));
        registry.register(LEGACY_NESTED_CONTENT_ALIAS, || Arc::new(NestedContentMigrator::new()));
        registry.register(ARCHETYPE_ALIAS, || Arc::new(ArchetypeMigrator::new()));
        registry.register("AngularGoogleMaps", || Arc::new(google_maps()));
        for alias in NU_PICKER_ALIASES {
            registry.register(alias, || Arc::new(nu_picker()));
        }
        registry
    }

    /// Register a factory for an editor alias, replacing any previous one.
    pub fn register<F>(&mut self, editor_alias: &str, factory: F)
    where
        F: Fn() -> Arc<dyn DataTypeMigrator> + Send + Sync + 'static,
    {
        let key = editor_alias.to_ascii_lowercase();
        self.resolved.get_mut().remove(&key);
        self.factories.insert(key, Arc::new(factory));
    }

    /// Register a migrator type under the alias inferred from its name.
    ///
    /// Returns the inferred alias, or `None` if the name does not follow
    /// the convention.
    pub fn register_by_convention<T>(&mut self) -> Option<String>
    where
        T: DataTypeMigrator + Default + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let Some(alias) = alias_by_convention(type_name) else {
            warn!(type_name, "Migrator type name does not end in Migrator");
            return None;
        };
        let alias = alias.to_string();
        self.register(&alias, || Arc::new(T::default()));
        Some(alias)
    }

    /// Whether a factory is registered for the alias.
    pub fn contains(&self, editor_alias: &str) -> bool {
        self.factories.contains_key(&editor_alias.to_ascii_lowercase())
    }

    /// Resolve the migrator for an editor alias.
    pub fn resolve(&self, editor_alias: &str) -> Option<Arc<dyn DataTypeMigrator>> {
        let key = editor_alias.to_ascii_lowercase();
        let mut resolved = self.resolved.lock();
        if let Some(hit) = resolved.get(&key) {
            return hit.clone();
        }

        let migrator = self.factories.get(&key).map(|factory| factory());
        if migrator.is_none() {
            debug!(editor_alias, "No data type migrator registered");
        }
        resolved.insert(key, migrator.clone());
        migrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FieldTypeDefinition;
    use crate::datatype::MigratorContext;
    use crate::datatype::MigratorError;
    use crate::transform::PropertyMigration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct SwatchMigrator;

    impl DataTypeMigrator for SwatchMigrator {
        fn property_migration(
            &self,
            _definition: &FieldTypeDefinition,
            _ctx: &MigratorContext<'_>,
        ) -> Result<Option<PropertyMigration>, MigratorError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct SliderDataTypeMigrator;

    impl DataTypeMigrator for SliderDataTypeMigrator {
        fn property_migration(
            &self,
            _definition: &FieldTypeDefinition,
            _ctx: &MigratorContext<'_>,
        ) -> Result<Option<PropertyMigration>, MigratorError> {
            Ok(None)
        }
    }

    #[test]
    fn test_alias_by_convention() {
        assert_eq!(alias_by_convention("my_crate::SliderDataTypeMigrator"), Some("Slider"));
        assert_eq!(alias_by_convention("SwatchMigrator"), Some("Swatch"));
        assert_eq!(alias_by_convention("Migrator"), None);
        assert_eq!(alias_by_convention("Swatch"), None);
    }

    #[test]
    fn test_register_by_convention() {
        let mut registry = MigratorRegistry::new();
        assert_eq!(
            registry.register_by_convention::<SwatchMigrator>().as_deref(),
            Some("Swatch")
        );
        assert_eq!(
            registry.register_by_convention::<SliderDataTypeMigrator>().as_deref(),
            Some("Slider")
        );
        assert!(registry.resolve("swatch").is_some());
        assert!(registry.resolve("SLIDER").is_some());
    }

    #[test]
    fn test_resolve_memoizes_hits_and_misses() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut registry = MigratorRegistry::new();
        let counter = Arc::clone(&built);
        registry.register("Custom.Editor", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(SwatchMigrator)
        });

        let first = registry.resolve("custom.editor").unwrap();
        let second = registry.resolve("Custom.Editor").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        assert!(registry.resolve("Missing.Editor").is_none());
        assert!(registry.resolve("missing.editor").is_none());
    }

    #[test]
    fn test_reregistering_clears_memoized_miss() {
        let mut registry = MigratorRegistry::new();
        assert!(registry.resolve("Late.Editor").is_none());
        registry.register("Late.Editor", || Arc::new(SwatchMigrator));
        assert!(registry.resolve("Late.Editor").is_some());
    }

    #[test]
    fn test_defaults_cover_builtin_editors() {
        let registry = MigratorRegistry::with_defaults();
        for alias in [
            "Umbraco.ContentPickerAlias",
            "Umbraco.MediaPicker",
            "Umbraco.MultipleMediaPicker",
            "Umbraco.MemberPicker",
            "Umbraco.MultiNodeTreePicker",
            "Umbraco.RelatedLinks",
            "RJP.MultiUrlPicker",
            "Umbraco.Grid",
            "Our.Umbraco.NestedContent",
            "Imulus.Archetype",
            "AngularGoogleMaps",
            "nuPickers.EnumDropDownPicker",
            "nuPickers.DotNetCheckBoxPicker",
            "nuPickers.DotNetDropDownPicker",
        ] {
            assert!(registry.contains(alias), "{alias}");
        }
    }
}
