//! Property transforms.
//!
//! A transform converts one field's raw value into another, in one
//! direction. Pairs of transforms form a [`PropertyMigration`].

pub mod json;
pub mod links;
pub mod property;
pub mod recoders;
pub mod reference;

pub use json::{
    pointer_child, ArrayElementExtractor, JsonExtractor, JsonLeaf, JsonTransform, LeafEncoding,
};
pub use links::{MultiUrlLinkTransform, RelatedLinkTransform};
pub use property::{
    apply_transform, Direction, PropertyHost, PropertyMigration, PropertyTransform,
    TransformContext, TransformError, UnsupportedTransform, VirtualNode, VIRTUAL_VALUE_FIELD,
};
pub use recoders::{MapLocationTransform, PickedKeysTransform, DEFAULT_MAP_ZOOM};
pub use reference::{
    map_id_token, resolve_id_token, IdToReferenceTransform, ReferenceCache,
    ReferenceToIdTransform, ResolvedNode,
};
