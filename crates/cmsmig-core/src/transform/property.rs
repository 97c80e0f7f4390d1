//! Property transforms and the hosts they read from and write to.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::reference::ReferenceCache;
use crate::content::{ContentNode, ContentRepository};
use crate::error::RepositoryError;

/// Which way a migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply upgraders.
    Upgrade,
    /// Apply downgraders.
    Downgrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upgrade => write!(f, "upgrade"),
            Direction::Downgrade => write!(f, "downgrade"),
        }
    }
}

/// Errors raised while transforming a single field value.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The host does not have this field.
    #[error("the property '{field}' is not a valid property for this type")]
    InvalidProperty {
        /// Requested field name.
        field: String,
    },

    /// The transform does not implement this direction.
    #[error("{direction} is not supported by {transform}")]
    Unsupported {
        /// Requested direction.
        direction: Direction,
        /// Name of the transform.
        transform: &'static str,
    },

    /// A value was expected to be JSON but was not.
    #[error("invalid JSON value: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A value could not be interpreted.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A lookup against the repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Anything a transform can read a named field from and write it back to.
pub trait PropertyHost {
    /// Whether the field exists.
    fn has_property(&self, field: &str) -> bool;

    /// Current value of the field.
    fn get_value(&self, field: &str) -> Result<Option<String>, TransformError>;

    /// Replace the value of the field.
    fn set_value(&mut self, field: &str, value: Option<String>) -> Result<(), TransformError>;
}

impl PropertyHost for ContentNode {
    fn has_property(&self, field: &str) -> bool {
        self.has_field(field)
    }

    fn get_value(&self, field: &str) -> Result<Option<String>, TransformError> {
        if !self.has_field(field) {
            return Err(TransformError::InvalidProperty {
                field: field.to_string(),
            });
        }
        Ok(self.value(field).map(str::to_string))
    }

    fn set_value(&mut self, field: &str, value: Option<String>) -> Result<(), TransformError> {
        if !self.has_field(field) {
            return Err(TransformError::InvalidProperty {
                field: field.to_string(),
            });
        }
        ContentNode::set_value(self, field, value);
        Ok(())
    }
}

/// Name of the only field a [`VirtualNode`] exposes.
pub const VIRTUAL_VALUE_FIELD: &str = "Value";

/// Stand-in node wrapping one sub-value, such as an element of a JSON array.
///
/// Exposes exactly one field, [`VIRTUAL_VALUE_FIELD`] (ASCII case ignored).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualNode {
    value: Option<String>,
}

impl VirtualNode {
    /// Wrap a value.
    pub fn new(value: Option<String>) -> Self {
        Self { value }
    }

    /// Current value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Take the value out.
    pub fn into_value(self) -> Option<String> {
        self.value
    }

    fn check(field: &str) -> Result<(), TransformError> {
        if field.eq_ignore_ascii_case(VIRTUAL_VALUE_FIELD) {
            Ok(())
        } else {
            Err(TransformError::InvalidProperty {
                field: field.to_string(),
            })
        }
    }
}

impl PropertyHost for VirtualNode {
    fn has_property(&self, field: &str) -> bool {
        field.eq_ignore_ascii_case(VIRTUAL_VALUE_FIELD)
    }

    fn get_value(&self, field: &str) -> Result<Option<String>, TransformError> {
        Self::check(field)?;
        Ok(self.value.clone())
    }

    fn set_value(&mut self, field: &str, value: Option<String>) -> Result<(), TransformError> {
        Self::check(field)?;
        self.value = value;
        Ok(())
    }
}

/// Lookups available to a transform while mapping.
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
    /// Host repository.
    pub repository: &'a dyn ContentRepository,
    /// Identity cache for this run.
    pub cache: &'a ReferenceCache,
}

impl<'a> TransformContext<'a> {
    /// Create a context.
    pub fn new(repository: &'a dyn ContentRepository, cache: &'a ReferenceCache) -> Self {
        Self { repository, cache }
    }
}

/// One direction of a field value conversion.
///
/// `map` must depend only on its input and the context.
pub trait PropertyTransform: Send + Sync {
    /// Short name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Read the value to transform.
    ///
    /// Returns `None` when the field is absent or holds no value, in which
    /// case nothing is mapped.
    fn try_get(
        &self,
        host: &dyn PropertyHost,
        field: &str,
    ) -> Result<Option<String>, TransformError> {
        if !host.has_property(field) {
            return Ok(None);
        }
        host.get_value(field)
    }

    /// Convert a value.
    fn map(&self, ctx: &TransformContext<'_>, from: &str) -> Result<Option<String>, TransformError>;

    /// Write the converted value back.
    fn set(
        &self,
        host: &mut dyn PropertyHost,
        field: &str,
        value: Option<String>,
    ) -> Result<(), TransformError> {
        host.set_value(field, value)
    }
}

/// Read, map and write one field. Returns whether the value changed.
pub fn apply_transform(
    transform: &dyn PropertyTransform,
    ctx: &TransformContext<'_>,
    host: &mut dyn PropertyHost,
    field: &str,
) -> Result<bool, TransformError> {
    let Some(from) = transform.try_get(host, field)? else {
        return Ok(false);
    };

    let to = transform.map(ctx, &from)?;
    if to.as_deref() == Some(from.as_str()) {
        return Ok(false);
    }

    transform.set(host, field, to)?;
    Ok(true)
}

/// A transform that always refuses, for directions that cannot be reversed.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedTransform {
    direction: Direction,
    transform: &'static str,
}

impl UnsupportedTransform {
    /// Refuse `direction` on behalf of the named transform.
    pub fn new(direction: Direction, transform: &'static str) -> Self {
        Self {
            direction,
            transform,
        }
    }
}

impl PropertyTransform for UnsupportedTransform {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn map(&self, _ctx: &TransformContext<'_>, _from: &str) -> Result<Option<String>, TransformError> {
        Err(TransformError::Unsupported {
            direction: self.direction,
            transform: self.transform,
        })
    }
}

/// An upgrader/downgrader pair for one field.
#[derive(Clone)]
pub struct PropertyMigration {
    upgrader: Arc<dyn PropertyTransform>,
    downgrader: Arc<dyn PropertyTransform>,
}

impl PropertyMigration {
    /// Create a reversible migration.
    pub fn new(upgrader: Arc<dyn PropertyTransform>, downgrader: Arc<dyn PropertyTransform>) -> Self {
        Self {
            upgrader,
            downgrader,
        }
    }

    /// Create a migration whose downgrade always fails.
    pub fn upgrade_only(upgrader: Arc<dyn PropertyTransform>) -> Self {
        let name = upgrader.name();
        Self {
            upgrader,
            downgrader: Arc::new(UnsupportedTransform::new(Direction::Downgrade, name)),
        }
    }

    /// The transform for a direction.
    pub fn transform(&self, direction: Direction) -> &dyn PropertyTransform {
        match direction {
            Direction::Upgrade => self.upgrader.as_ref(),
            Direction::Downgrade => self.downgrader.as_ref(),
        }
    }

    /// Forward transform.
    pub fn upgrader(&self) -> &dyn PropertyTransform {
        self.upgrader.as_ref()
    }

    /// Reverse transform.
    pub fn downgrader(&self) -> &dyn PropertyTransform {
        self.downgrader.as_ref()
    }
}

impl fmt::Debug for PropertyMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMigration")
            .field("upgrader", &self.upgrader.name())
            .field("downgrader", &self.downgrader.name())
            .finish()
    }
}
