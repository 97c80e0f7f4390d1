//! Product version numbers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A version string that could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid version '{0}': expected MAJOR[.MINOR[.PATCH]]")]
pub struct ParseVersionError(pub String);

/// A `major.minor.patch` version. Missing components parse as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl Version {
    /// The version of a product nothing has been recorded for.
    pub const ZERO: Version = Version::new(0, 0, 0);

    /// Create a version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseVersionError(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let mut parts = [0u64; 3];
        let mut count = 0;
        for part in trimmed.split('.') {
            if count == parts.len() {
                return Err(invalid());
            }
            parts[count] = part.parse().map_err(|_| invalid())?;
            count += 1;
        }

        Ok(Version::new(parts[0], parts[1], parts[2]))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
