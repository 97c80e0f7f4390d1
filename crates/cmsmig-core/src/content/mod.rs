//! Content data model and the host repository interface.

pub mod field_type;
pub mod memory;
pub mod node;
pub mod reference;
pub mod repository;
pub mod schema;

pub use field_type::{
    ContentPickerConfig, FieldTypeConfig, FieldTypeDefinition, FieldTypeRef, GridArea, GridConfig,
    GridEditor, GridLayout, MediaPickerConfig, StorageKind, TreePickerConfig, TreeSource,
    TreeSourceType,
};
pub use memory::{InMemoryRepository, SaveRecord};
pub use node::{BaseType, ContentNode};
pub use reference::{GlobalReference, ReferenceParseError, REFERENCE_SCHEME};
pub use repository::{ContentRepository, Page, PublishOutcome};
pub use schema::{SchemaField, SchemaGraph, SchemaType};
