//! Content sources: which nodes a mapper visits.

use std::collections::VecDeque;

use tracing::warn;

use crate::content::{BaseType, ContentNode, ContentRepository, SchemaGraph};
use crate::error::RepositoryError;

/// Default number of nodes fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Iterator over sourced nodes.
pub type ContentIter<'a> = Box<dyn Iterator<Item = Result<ContentNode, RepositoryError>> + 'a>;

/// Enumerates the content nodes a mapper applies to.
pub trait ContentSource: Send + Sync {
    /// Name used to group counts in the run report.
    fn source_name(&self) -> &str;

    /// Base type of every node produced.
    fn base_type(&self) -> BaseType;

    /// Enumerate nodes. Unknown sources yield nothing.
    fn contents<'a>(&'a self, repository: &'a dyn ContentRepository) -> ContentIter<'a>;
}

/// All nodes of a schema type, optionally including descendant types.
#[derive(Debug, Clone)]
pub struct ContentsByTypeSource {
    base_type: BaseType,
    alias: String,
    include_descendants: bool,
    page_size: usize,
}

impl ContentsByTypeSource {
    /// Nodes of `alias` and of every type inheriting from or composing it.
    pub fn new(base_type: BaseType, alias: impl Into<String>) -> Self {
        Self {
            base_type,
            alias: alias.into(),
            include_descendants: true,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Nodes of exactly `alias`.
    pub fn exact(base_type: BaseType, alias: impl Into<String>) -> Self {
        Self::new(base_type, alias).with_descendants(false)
    }

    /// Set whether descendant types are included.
    pub fn with_descendants(mut self, include: bool) -> Self {
        self.include_descendants = include;
        self
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Schema type ids this source covers, or `None` if the alias is unknown.
    pub fn schema_ids(
        &self,
        repository: &dyn ContentRepository,
    ) -> Result<Option<Vec<i64>>, RepositoryError> {
        let types = repository.schema_types(self.base_type)?;
        let Some(root) = types
            .iter()
            .find(|t| t.alias.eq_ignore_ascii_case(&self.alias))
        else {
            return Ok(None);
        };

        if !self.include_descendants {
            return Ok(Some(vec![root.id]));
        }
        Ok(Some(SchemaGraph::build(&types).descendants_of(root.id)))
    }
}

impl ContentSource for ContentsByTypeSource {
    fn source_name(&self) -> &str {
        &self.alias
    }

    fn base_type(&self) -> BaseType {
        self.base_type
    }

    fn contents<'a>(&'a self, repository: &'a dyn ContentRepository) -> ContentIter<'a> {
        match self.schema_ids(repository) {
            Ok(Some(ids)) => Box::new(PagedContents::new(
                repository,
                self.base_type,
                ids,
                self.page_size,
            )),
            Ok(None) => {
                warn!(
                    base_type = %self.base_type,
                    alias = %self.alias,
                    "Could not find schema type"
                );
                Box::new(std::iter::empty())
            }
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }
}

/// Pages through nodes of a set of schema types.
///
/// The page to fetch is derived from the number of nodes already yielded;
/// iteration stops once the reported total is reached or a page comes back
/// empty.
pub struct PagedContents<'a> {
    repository: &'a dyn ContentRepository,
    base_type: BaseType,
    schema_ids: Vec<i64>,
    page_size: usize,
    yielded: u64,
    total: Option<u64>,
    buffer: VecDeque<ContentNode>,
    done: bool,
}

impl<'a> PagedContents<'a> {
    /// Create a pager.
    pub fn new(
        repository: &'a dyn ContentRepository,
        base_type: BaseType,
        schema_ids: Vec<i64>,
        page_size: usize,
    ) -> Self {
        Self {
            repository,
            base_type,
            schema_ids,
            page_size: page_size.max(1),
            yielded: 0,
            total: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }
}

impl Iterator for PagedContents<'_> {
    type Item = Result<ContentNode, RepositoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.buffer.pop_front() {
                self.yielded += 1;
                return Some(Ok(node));
            }
            if self.done || self.total.is_some_and(|total| self.yielded >= total) {
                return None;
            }

            let page_index = self.yielded / self.page_size as u64;
            match self.repository.nodes_of_types(
                self.base_type,
                &self.schema_ids,
                page_index,
                self.page_size,
            ) {
                Ok(page) => {
                    self.total = Some(page.total);
                    if page.items.is_empty() {
                        self.done = true;
                    }
                    self.buffer.extend(page.items);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
