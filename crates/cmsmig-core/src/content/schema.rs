//! Schema types and their inheritance graph.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// A field declared directly on a schema type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field alias on content nodes.
    pub alias: String,
    /// Id of the field type definition backing this field.
    pub field_type_id: i64,
}

impl SchemaField {
    /// Create a new field.
    pub fn new(alias: impl Into<String>, field_type_id: i64) -> Self {
        Self {
            alias: alias.into(),
            field_type_id,
        }
    }
}

/// Structural definition shared by all content nodes of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaType {
    /// Schema type id.
    pub id: i64,
    /// Unique alias.
    pub alias: String,
    /// Display name.
    pub name: String,
    /// Icon shown next to nodes of this type.
    pub icon: Option<String>,
    /// Single parent id, or a value `<= 0` for none.
    pub parent_id: i64,
    /// Ids of schema types composed into this one.
    pub composition_ids: Vec<i64>,
    /// Fields declared on this type itself.
    pub fields: Vec<SchemaField>,
}

impl SchemaType {
    /// Create a schema type with no parent.
    pub fn new(id: i64, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            id,
            name: alias.clone(),
            alias,
            icon: None,
            parent_id: -1,
            composition_ids: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Set the single parent.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Add a composition.
    pub fn with_composition(mut self, composition_id: i64) -> Self {
        self.composition_ids.push(composition_id);
        self
    }

    /// Add a declared field.
    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    /// Set the icon.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Ids this type inherits from: its parent (if any) and its compositions.
    pub fn ancestor_ids(&self) -> impl Iterator<Item = i64> + '_ {
        std::iter::once(self.parent_id)
            .chain(self.composition_ids.iter().copied())
            .filter(|id| *id > 0)
    }
}

/// Parent/child adjacency across a set of schema types.
///
/// Both single-parent and composition edges are included.
#[derive(Debug, Default)]
pub struct SchemaGraph {
    children: HashMap<i64, Vec<i64>>,
    parents: HashMap<i64, Vec<i64>>,
}

impl SchemaGraph {
    /// Build the graph from a list of schema types.
    pub fn build(types: &[SchemaType]) -> Self {
        let mut graph = Self::default();
        for schema in types {
            for ancestor in schema.ancestor_ids() {
                graph.children.entry(ancestor).or_default().push(schema.id);
                graph.parents.entry(schema.id).or_default().push(ancestor);
            }
        }
        graph
    }

    /// The type itself and every transitive descendant, each exactly once.
    ///
    /// Order is depth-first from `root`.
    pub fn descendants_of(&self, root: i64) -> Vec<i64> {
        Self::closure(&self.children, root)
    }

    /// The type itself and every transitive ancestor, each exactly once.
    pub fn ancestors_of(&self, root: i64) -> Vec<i64> {
        Self::closure(&self.parents, root)
    }

    fn closure(edges: &HashMap<i64, Vec<i64>>, root: i64) -> Vec<i64> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(next) = edges.get(&id) {
                // Reverse so the first declared edge is visited first.
                stack.extend(next.iter().rev().copied());
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Vec<SchemaType> {
        // A <- X, A <- Y, B composes X and Y, C has parent B.
        vec![
            SchemaType::new(1, "a"),
            SchemaType::new(2, "x").with_parent(1),
            SchemaType::new(3, "y").with_composition(1),
            SchemaType::new(4, "b").with_composition(2).with_composition(3),
            SchemaType::new(5, "c").with_parent(4),
        ]
    }

    #[test]
    fn test_descendants_dedupes_diamond() {
        let graph = SchemaGraph::build(&diamond());
        let mut ids = graph.descendants_of(1);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_ancestors_follow_compositions() {
        let graph = SchemaGraph::build(&diamond());
        let mut ids = graph.ancestors_of(5);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cycle_terminates() {
        let types = vec![
            SchemaType::new(1, "a").with_composition(2),
            SchemaType::new(2, "b").with_composition(1),
        ];
        let graph = SchemaGraph::build(&types);
        assert_eq!(graph.descendants_of(1).len(), 2);
    }

    #[test]
    fn test_unknown_root_yields_itself() {
        let graph = SchemaGraph::build(&[]);
        assert_eq!(graph.descendants_of(42), vec![42]);
    }
}
