//! Error types shared across the migration engine.

use thiserror::Error;

use crate::config::ConfigError;
use crate::content::BaseType;
use crate::datatype::MigratorError;
use crate::mapping::SaveError;
use crate::migration::{MigrationError, ResolveError, StoreError, TriggerError};
use crate::transform::TransformError;

/// Failures reported by the host content repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested item does not exist.
    #[error("{kind} not found: {what}")]
    NotFound {
        /// What kind of item was looked up.
        kind: &'static str,
        /// Identifier that was looked up.
        what: String,
    },

    /// The repository refused the write.
    #[error("{base_type} #{id} rejected: {reason}")]
    Rejected {
        /// Base type of the rejected node.
        base_type: BaseType,
        /// Identity of the rejected node.
        id: i64,
        /// Reason given by the repository.
        reason: String,
    },

    /// Any other backend failure.
    #[error("repository backend error: {0}")]
    Backend(String),
}

/// Top-level error type for the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Host repository error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Property transform error.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Node save error.
    #[error(transparent)]
    Save(#[from] SaveError),

    /// Data type migrator error.
    #[error(transparent)]
    Migrator(#[from] MigratorError),

    /// Migration resolution error.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Migration execution error.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Version store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Manual trigger error.
    #[error(transparent)]
    Trigger(#[from] TriggerError),
}

/// Result alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;
