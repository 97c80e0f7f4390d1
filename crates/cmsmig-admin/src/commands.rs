//! Command execution.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use cmsmig_core::config::{ConfigError, MigrationSettings};
use cmsmig_core::migration::{
    current_of, ManualTrigger, ParseVersionError, SledVersionStore, StoreError, Version, VersionEntry, VersionStore,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::cli::Command;

/// Errors from admin commands.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The state database could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Database path.
        path: String,
        /// Underlying error.
        #[source]
        source: sled::Error,
    },

    /// Version state error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The version argument is not a version.
    #[error(transparent)]
    Version(#[from] ParseVersionError),

    /// Recording would move the product backwards.
    #[error("{product} is already at {current}; pass --force to record {requested}")]
    Downgrade {
        /// Product name.
        product: String,
        /// Current version.
        current: Version,
        /// Requested version.
        requested: Version,
    },

    /// The settings file is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Run `command` against the database at `db_path` and return its output.
pub fn execute(db_path: &Path, command: Command) -> Result<String, AdminError> {
    match command {
        Command::Versions { product } => versions(&open_store(db_path)?, &product),
        Command::Products => products(&open_store(db_path)?),
        Command::Record {
            product,
            version,
            force,
        } => record(&open_store(db_path)?, &product, &version, force),
        Command::CheckConfig { file } => check_config(&file),
    }
}

fn open_store(path: &Path) -> Result<SledVersionStore, AdminError> {
    let db = sled::open(path).map_err(|source| AdminError::Open {
        path: path.display().to_string(),
        source,
    })?;
    Ok(SledVersionStore::open(&db)?)
}

fn versions(store: &SledVersionStore, product: &str) -> Result<String, AdminError> {
    let entries = store.versions(product)?;
    if entries.is_empty() {
        return Ok(format!("No versions recorded for {product}\n"));
    }

    let mut out = String::new();
    for entry in &entries {
        let _ = write!(out, "{:<12} {}", entry.version.to_string(), entry.recorded_at.to_rfc3339());
        if entry.forced {
            out.push_str(" (forced)");
        }
        out.push('\n');
    }
    let _ = writeln!(out, "current: {}", current_of(&entries));
    Ok(out)
}

fn products(store: &SledVersionStore) -> Result<String, AdminError> {
    let mut by_product: BTreeMap<String, Vec<VersionEntry>> = BTreeMap::new();
    for entry in store.all()? {
        by_product.entry(entry.product.to_lowercase()).or_default().push(entry);
    }
    if by_product.is_empty() {
        return Ok("No products recorded\n".to_string());
    }

    let mut out = String::new();
    for (product, entries) in &by_product {
        let _ = writeln!(out, "{product:<24} {}", current_of(entries));
    }
    Ok(out)
}

fn record(store: &SledVersionStore, product: &str, version: &str, force: bool) -> Result<String, AdminError> {
    let requested: Version = version.parse()?;
    let current = store.current_version(product)?;
    let entry = if requested < current {
        if !force {
            return Err(AdminError::Downgrade {
                product: product.to_string(),
                current,
                requested,
            });
        }
        warn!(product, %current, %requested, "Forcing a version below the current one");
        VersionEntry::forced(product, requested)
    } else {
        VersionEntry::new(product, requested)
    };

    store.record(&entry)?;
    info!(product, version = %requested, "Recorded version");
    Ok(format!("Recorded {product} {requested}\n"))
}

fn check_config(file: &Path) -> Result<String, AdminError> {
    let settings = MigrationSettings::load(file)?;
    let trigger = ManualTrigger::from_settings(&settings);

    let mut out = String::new();
    let _ = writeln!(out, "run at startup:      {}", settings.run_at_startup);
    let _ = writeln!(out, "retain invalid data: {}", settings.retain_invalid_data);
    let _ = writeln!(out, "raise events:        {}", settings.raise_events);
    let _ = writeln!(out, "platform product:    {}", settings.platform_product_name);
    let _ = writeln!(out, "manual trigger:      {}", if trigger.is_enabled() { "enabled" } else { "disabled" });
    let _ = writeln!(out, "resolvers:           {}", settings.resolvers.len());
    for resolver in &settings.resolvers {
        let _ = write!(out, "  {} ({})", resolver.name, resolver.type_name);
        if let Some(products) = resolver.settings.monitored_product_names() {
            let _ = write!(out, ": {}", products.join(", "));
        }
        out.push('\n');
    }
    Ok(out)
}
