//! Global references: `umb://kind/guid` identifiers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

use super::node::BaseType;

/// Scheme of every global reference.
pub const REFERENCE_SCHEME: &str = "umb";

/// Why a string is not a global reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceParseError {
    /// Missing or wrong scheme.
    #[error("expected scheme 'umb://' in '{0}'")]
    Scheme(String),
    /// Host is not one of document, media or member.
    #[error("unknown entity kind '{0}'")]
    Kind(String),
    /// Path is not a GUID.
    #[error("invalid key '{0}'")]
    Key(String),
}

/// A globally unique, type-tagged reference to a content node.
///
/// Always formatted as lower-case hex with no dashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalReference {
    /// Kind of node referenced.
    pub base_type: BaseType,
    /// Key of the node.
    pub key: Uuid,
}

impl GlobalReference {
    /// Create a reference.
    pub fn new(base_type: BaseType, key: Uuid) -> Self {
        Self { base_type, key }
    }

    /// Whether `s` has the shape of a reference of any entity kind.
    ///
    /// This is looser than [`FromStr`]: entity kinds other than the three
    /// content base types are accepted, so their values pass through
    /// untouched.
    pub fn is_well_formed(s: &str) -> bool {
        match split_reference(s) {
            Some((host, path)) => {
                !host.is_empty()
                    && host.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                    && !path.is_empty()
            }
            None => false,
        }
    }
}

fn split_reference(s: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = s.trim().split_once("://")?;
    if !scheme.eq_ignore_ascii_case(REFERENCE_SCHEME) {
        return None;
    }
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    Some((host, path.trim_matches('/')))
}

impl fmt::Display for GlobalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}",
            REFERENCE_SCHEME,
            self.base_type.entity_name(),
            self.key.simple()
        )
    }
}

impl FromStr for GlobalReference {
    type Err = ReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, path) =
            split_reference(s).ok_or_else(|| ReferenceParseError::Scheme(s.to_string()))?;
        let base_type = BaseType::from_entity_name(host)
            .ok_or_else(|| ReferenceParseError::Kind(host.to_string()))?;
        let key = Uuid::parse_str(path).map_err(|_| ReferenceParseError::Key(path.to_string()))?;
        Ok(Self { base_type, key })
    }
}
