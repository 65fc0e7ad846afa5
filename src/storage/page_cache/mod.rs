// BayunGraph Page Cache
//
// Durable buffered I/O over store files. Recovery maps every store file
// through here and only relies on writes being durable once flushed.

pub mod error;
pub mod paged_file;
mod replacer;
pub mod tracer;

use std::path::Path;
use std::sync::Arc;

pub use error::{PageCacheError, Result};
pub use paged_file::PagedFile;
pub use tracer::{PageCacheTracer, Tracers};

/// Factory for paged files sharing one tracer and one residency budget
pub struct PageCache {
    /// Maximum resident pages per mapped file
    max_pages: usize,

    /// Tracer shared by every mapped file
    tracer: Arc<PageCacheTracer>,
}

impl PageCache {
    pub fn new(max_pages: usize, tracer: Arc<PageCacheTracer>) -> Self {
        Self {
            max_pages: max_pages.max(1),
            tracer,
        }
    }

    /// Map a file with the given page size. A missing file is an error
    /// unless `create` is set.
    pub fn map(&self, path: impl AsRef<Path>, page_size: usize, create: bool) -> Result<PagedFile> {
        PagedFile::open(path, page_size, create, self.max_pages, self.tracer.clone())
    }

    pub fn tracer(&self) -> &Arc<PageCacheTracer> {
        &self.tracer
    }
}
