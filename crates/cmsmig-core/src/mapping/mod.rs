//! Field mapping engine.
//!
//! Sources enumerate nodes, mappers bind sources to field mappings and
//! persist changes, and the runner drives both while counting outcomes.

pub mod mapper;
pub mod runner;
pub mod source;

pub use mapper::{ContentTransformMapper, FieldMapping, PreChangeState, SaveError, TransformMapper};
pub use runner::{Counts, TransformReport, TransformRunner};
pub use source::{ContentIter, ContentSource, ContentsByTypeSource, PagedContents, DEFAULT_PAGE_SIZE};
