//! Recorded product versions and the host's transactional scope.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::StoreError;
use super::version::Version;

/// One recorded version of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Product name as given when recorded.
    pub product: String,
    /// Version reached.
    pub version: Version,
    /// When the version was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Operator override. Entries before it no longer count.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forced: bool,
}

impl VersionEntry {
    /// Entry for `product` at `version`, stamped now.
    pub fn new(product: impl Into<String>, version: Version) -> Self {
        Self {
            product: product.into(),
            version,
            recorded_at: Utc::now(),
            forced: false,
        }
    }

    /// Override entry that sets `product` to `version`, even below the
    /// versions recorded so far.
    pub fn forced(product: impl Into<String>, version: Version) -> Self {
        Self {
            forced: true,
            ..Self::new(product, version)
        }
    }
}

/// Current version described by entries in recording order.
///
/// The highest version recorded since the last forced entry, or
/// [`Version::ZERO`] when there are none.
pub fn current_of(entries: &[VersionEntry]) -> Version {
    let start = entries.iter().rposition(|e| e.forced).unwrap_or(0);
    entries[start..]
        .iter()
        .map(|e| e.version)
        .max()
        .unwrap_or(Version::ZERO)
}

/// Persisted migration version state.
///
/// Entries are only ever appended. The current version of a product is the
/// highest version recorded for it since its last forced entry.
pub trait VersionStore: Send + Sync {
    /// Every entry recorded for `product`, oldest first. Case-insensitive.
    fn versions(&self, product: &str) -> Result<Vec<VersionEntry>, StoreError>;

    /// Append an entry.
    fn record(&self, entry: &VersionEntry) -> Result<(), StoreError>;

    /// Current version of `product`, see [`current_of`].
    fn current_version(&self, product: &str) -> Result<Version, StoreError> {
        Ok(current_of(&self.versions(product)?))
    }
}

/// Version state stored in a sled tree.
pub struct SledVersionStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledVersionStore {
    /// Tree name for recorded versions.
    pub const TREE_NAME: &'static str = "migration:versions";

    /// Open or create the store.
    pub fn open(db: &sled::Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(Self::TREE_NAME)?;
        Ok(Self {
            db: db.clone(),
            tree,
        })
    }

    /// Every entry of every product.
    pub fn all(&self) -> Result<Vec<VersionEntry>, StoreError> {
        let mut entries = Vec::new();
        for result in self.tree.iter() {
            let (_, value) = result?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    fn product_prefix(product: &str) -> Vec<u8> {
        let mut prefix = product.to_lowercase().into_bytes();
        prefix.push(0);
        prefix
    }

    fn entry_key(&self, entry: &VersionEntry) -> Result<Vec<u8>, StoreError> {
        let nanos = entry.recorded_at.timestamp_nanos_opt().unwrap_or_default().max(0) as u64;
        let mut key = Self::product_prefix(&entry.product);
        key.extend_from_slice(&nanos.to_be_bytes());
        key.extend_from_slice(&self.db.generate_id()?.to_be_bytes());
        Ok(key)
    }
}

impl VersionStore for SledVersionStore {
    fn versions(&self, product: &str) -> Result<Vec<VersionEntry>, StoreError> {
        let mut entries = Vec::new();
        for result in self.tree.scan_prefix(Self::product_prefix(product)) {
            let (_, value) = result?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    fn record(&self, entry: &VersionEntry) -> Result<(), StoreError> {
        let key = self.entry_key(entry)?;
        let value = serde_json::to_vec(entry)?;
        self.tree.insert(key, value)?;
        self.tree.flush()?;
        debug!(product = %entry.product, version = %entry.version, "Recorded product version");
        Ok(())
    }
}

/// Version state held in process.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    entries: Mutex<Vec<VersionEntry>>,
}

impl MemoryVersionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry of every product, in recording order.
    pub fn all(&self) -> Vec<VersionEntry> {
        self.entries.lock().clone()
    }
}

impl VersionStore for MemoryVersionStore {
    fn versions(&self, product: &str) -> Result<Vec<VersionEntry>, StoreError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.product.eq_ignore_ascii_case(product))
            .cloned()
            .collect())
    }

    fn record(&self, entry: &VersionEntry) -> Result<(), StoreError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Opens the host's transactional scope around a migration plan.
pub trait ScopeProvider: Send + Sync {
    /// Open a scope. It is released when dropped unless committed.
    fn begin(&self) -> Result<Box<dyn TransactionScope + '_>, StoreError>;
}

/// An open transactional scope.
pub trait TransactionScope {
    /// Complete the scope.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
