//! Dependency ordering of one product's migration units.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tracing::warn;

use super::error::ResolveError;
use super::unit::{CatalogEntry, UnitCatalog, UnitId};
use super::version::Version;

/// Order a product's units so every dependency runs before its dependents.
///
/// Units with no relationship to each other run in target version order,
/// then by name. Dependencies on units of other products are ignored. A
/// dependency on a unit missing from the catalog, or a cycle, is an error.
pub fn order_units<'c>(
    product: &str,
    units: &[&'c CatalogEntry],
    catalog: &UnitCatalog,
) -> Result<Vec<&'c CatalogEntry>, ResolveError> {
    let position: HashMap<UnitId, usize> = units.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
    let mut blocking = vec![0usize; units.len()];

    for (idx, entry) in units.iter().enumerate() {
        for dependency in &entry.tag.depends_on {
            match position.get(dependency) {
                Some(&dep_idx) if dep_idx != idx => {
                    dependents[dep_idx].push(idx);
                    blocking[idx] += 1;
                }
                Some(_) => {
                    return Err(ResolveError::DependencyCycle {
                        product: product.to_string(),
                        units: vec![entry.id.short_name().to_string()],
                    });
                }
                None if catalog.get(dependency).is_some() => {}
                None => {
                    return Err(ResolveError::UnknownDependency {
                        unit: entry.id.short_name().to_string(),
                        dependency: dependency.short_name().to_string(),
                    });
                }
            }
        }
    }

    let key = |idx: usize| -> Reverse<(Version, &'static str, usize)> {
        Reverse((units[idx].tag.target_version, units[idx].id.name(), idx))
    };
    let mut ready: BinaryHeap<_> = (0..units.len())
        .filter(|&idx| blocking[idx] == 0)
        .map(key)
        .collect();

    let mut ordered = Vec::with_capacity(units.len());
    while let Some(Reverse((_, _, idx))) = ready.pop() {
        ordered.push(units[idx]);
        for &next in &dependents[idx] {
            blocking[next] -= 1;
            if blocking[next] == 0 {
                ready.push(key(next));
            }
        }
    }

    if ordered.len() < units.len() {
        let mut stuck: Vec<String> = (0..units.len())
            .filter(|&idx| blocking[idx] > 0)
            .map(|idx| units[idx].id.short_name().to_string())
            .collect();
        stuck.sort();
        return Err(ResolveError::DependencyCycle {
            product: product.to_string(),
            units: stuck,
        });
    }

    for pair in ordered.windows(2) {
        if pair[1].tag.target_version < pair[0].tag.target_version {
            warn!(
                product,
                unit = %pair[1].id,
                version = %pair[1].tag.target_version,
                after = %pair[0].id,
                "Migration runs after a unit with a higher target version"
            );
        }
    }

    Ok(ordered)
}
