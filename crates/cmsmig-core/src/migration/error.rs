//! Errors raised while resolving, executing and recording migrations.

use thiserror::Error;

use super::version::ParseVersionError;
use crate::error::RepositoryError;
use crate::transform::Direction;

/// Failures while ordering migration units.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Units of one product depend on each other in a loop.
    #[error("dependency cycle in product '{product}' between: {}", units.join(", "))]
    DependencyCycle {
        /// Product whose units form the cycle.
        product: String,
        /// Units left unordered by the cycle.
        units: Vec<String>,
    },

    /// A unit depends on a unit that was never registered.
    #[error("unit '{unit}' depends on unregistered unit '{dependency}'")]
    UnknownDependency {
        /// Dependent unit.
        unit: String,
        /// Missing dependency.
        dependency: String,
    },

    /// A resolver setting is missing or malformed.
    #[error("invalid resolver setting '{key}': {reason}")]
    InvalidSetting {
        /// Setting key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Recorded versions could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the persisted version state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage engine failure.
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    /// A stored entry could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored version string is not a version.
    #[error(transparent)]
    InvalidVersion(#[from] ParseVersionError),

    /// The host's transactional scope failed.
    #[error("scope error: {0}")]
    Scope(String),
}

/// Failures while executing a migration plan.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A unit's step failed.
    #[error("migration '{unit}' to {version} failed: {reason}")]
    UnitFailed {
        /// Unit name.
        unit: String,
        /// Target version of the step.
        version: String,
        /// Why it failed.
        reason: String,
    },

    /// The unit cannot run in this direction.
    #[error("migration '{unit}' does not support {direction}")]
    Unsupported {
        /// Unit name.
        unit: String,
        /// Requested direction.
        direction: Direction,
    },

    /// Version state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The content repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Planning failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
