//! Conversions between integer identities and global references.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::property::{PropertyTransform, TransformContext, TransformError};
use crate::content::{BaseType, ContentRepository, GlobalReference};
use crate::error::RepositoryError;

/// What the cache remembers about a resolved node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    /// The node's integer identity.
    pub id: i64,
    /// The node's global reference.
    pub reference: GlobalReference,
    /// Display name.
    pub name: String,
    /// Alias of the node's schema type.
    pub schema_alias: String,
}

/// Identity resolution cache owned by one migration run.
///
/// Misses are cached as well as hits, so every identity resolves the same
/// way for the lifetime of the cache. Repository failures are not cached.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    by_id: Mutex<HashMap<(BaseType, i64), Option<ResolvedNode>>>,
    by_reference: Mutex<HashMap<GlobalReference, Option<i64>>>,
}

impl ReferenceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an integer identity of the given base type.
    pub fn resolve_id(
        &self,
        repository: &dyn ContentRepository,
        base_type: BaseType,
        id: i64,
    ) -> Result<Option<ResolvedNode>, RepositoryError> {
        if let Some(hit) = self.by_id.lock().get(&(base_type, id)) {
            return Ok(hit.clone());
        }

        let resolved = repository.node_by_id(base_type, id)?.map(|node| ResolvedNode {
            id: node.id,
            reference: GlobalReference::new(base_type, node.key),
            name: node.name,
            schema_alias: node.schema_alias,
        });

        self.by_id.lock().insert((base_type, id), resolved.clone());
        if let Some(node) = &resolved {
            self.by_reference.lock().insert(node.reference, Some(node.id));
        }
        Ok(resolved)
    }

    /// Resolve a global reference back to an integer identity.
    pub fn resolve_reference(
        &self,
        repository: &dyn ContentRepository,
        reference: GlobalReference,
    ) -> Result<Option<i64>, RepositoryError> {
        if let Some(hit) = self.by_reference.lock().get(&reference) {
            return Ok(*hit);
        }

        let id = repository
            .node_by_key(reference.base_type, reference.key)?
            .map(|node| node.id);
        self.by_reference.lock().insert(reference, id);
        Ok(id)
    }

    /// Number of cached identities, hits and misses together.
    pub fn len(&self) -> usize {
        self.by_id.lock().len() + self.by_reference.lock().len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn tokens(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').filter(|t| !t.is_empty())
}

/// Resolve an integer identity token to its node.
///
/// Returns `None` when the token is not an integer or does not resolve.
pub fn resolve_id_token(
    ctx: &TransformContext<'_>,
    token: &str,
    base_type: BaseType,
) -> Result<Option<ResolvedNode>, TransformError> {
    match token.trim().parse::<i64>() {
        Ok(id) => Ok(ctx.cache.resolve_id(ctx.repository, base_type, id)?),
        Err(_) => Ok(None),
    }
}

/// Map one token of an id list to a reference. `None` drops the token.
///
/// Integer tokens that do not resolve are dropped. Tokens already shaped
/// like a reference pass through. Anything else is kept only when
/// `retain_invalid_data` is set.
pub fn map_id_token(
    ctx: &TransformContext<'_>,
    token: &str,
    base_type: BaseType,
    retain_invalid_data: bool,
) -> Result<Option<String>, TransformError> {
    if token.trim().parse::<i64>().is_ok() {
        return Ok(resolve_id_token(ctx, token, base_type)?.map(|n| n.reference.to_string()));
    }
    if GlobalReference::is_well_formed(token) || retain_invalid_data {
        return Ok(Some(token.to_string()));
    }
    Ok(None)
}

/// Rewrites comma-separated integer identities as global references.
#[derive(Debug, Clone)]
pub struct IdToReferenceTransform {
    base_type: BaseType,
    retain_invalid_data: bool,
}

impl IdToReferenceTransform {
    /// Create a transform resolving identities of `base_type`.
    pub fn new(base_type: BaseType, retain_invalid_data: bool) -> Self {
        Self {
            base_type,
            retain_invalid_data,
        }
    }
}

impl PropertyTransform for IdToReferenceTransform {
    fn name(&self) -> &'static str {
        "id-to-reference"
    }

    fn map(&self, ctx: &TransformContext<'_>, from: &str) -> Result<Option<String>, TransformError> {
        let mut out = Vec::new();
        for token in tokens(from) {
            if let Some(mapped) = map_id_token(ctx, token, self.base_type, self.retain_invalid_data)? {
                out.push(mapped);
            }
        }
        Ok(Some(out.join(",")))
    }
}

/// Rewrites comma-separated global references as integer identities.
///
/// Tokens that are already integers, or that do not resolve, are kept.
#[derive(Debug, Clone, Default)]
pub struct ReferenceToIdTransform;

impl ReferenceToIdTransform {
    /// Create the transform.
    pub fn new() -> Self {
        Self
    }
}

impl PropertyTransform for ReferenceToIdTransform {
    fn name(&self) -> &'static str {
        "reference-to-id"
    }

    fn map(&self, ctx: &TransformContext<'_>, from: &str) -> Result<Option<String>, TransformError> {
        let mut out = Vec::new();
        for token in tokens(from) {
            let resolved = match token.trim().parse::<GlobalReference>() {
                Ok(reference) => ctx.cache.resolve_reference(ctx.repository, reference)?,
                Err(_) => None,
            };
            out.push(match resolved {
                Some(id) => id.to_string(),
                None => token.to_string(),
            });
        }
        Ok(Some(out.join(",")))
    }
}
