use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use parking_lot::Mutex;
use log::debug;

use crate::common::types::{Page, PageId};
use crate::storage::disk::DiskManager;
use super::error::{PageCacheError, Result};
use super::replacer::EvictionOrder;
use super::tracer::PageCacheTracer;

/// Resident pages and their replacement order
struct ResidentPages {
    pages: HashMap<PageId, Page>,
    eviction: EvictionOrder,
}

/// A file mapped into the page cache
pub struct PagedFile {
    disk_manager: DiskManager,
    page_size: usize,
    capacity: usize,
    resident: Mutex<ResidentPages>,
    tracer: Arc<PageCacheTracer>,
}

impl PagedFile {
    pub(super) fn open(
        path: impl AsRef<Path>,
        page_size: usize,
        create: bool,
        capacity: usize,
        tracer: Arc<PageCacheTracer>,
    ) -> Result<Self> {
        let disk_manager = DiskManager::new(path, page_size, create)?;
        Ok(Self {
            disk_manager,
            page_size,
            capacity,
            resident: Mutex::new(ResidentPages {
                pages: HashMap::with_capacity(capacity),
                eviction: EvictionOrder::new(capacity),
            }),
            tracer,
        })
    }

    /// Pin a page, faulting it in if needed, and run `f` on it
    fn with_page<R>(&self, page_id: PageId, f: impl FnOnce(&mut Page) -> R) -> Result<R> {
        let mut resident = self.resident.lock();
        self.tracer.pin();

        if !resident.pages.contains_key(&page_id) {
            self.tracer.fault();

            if resident.pages.len() >= self.capacity {
                if let Some(victim) = resident.eviction.pop_oldest() {
                    if let Some(evicted) = resident.pages.remove(&victim) {
                        if evicted.is_dirty {
                            self.disk_manager.write_page(&evicted)?;
                        }
                        self.tracer.evict();
                    }
                }
            }

            let mut page = Page::new(page_id, self.page_size);
            self.disk_manager.read_page(page_id, &mut page)?;
            resident.pages.insert(page_id, page);
        }

        resident.eviction.touch(page_id);
        match resident.pages.get_mut(&page_id) {
            Some(page) => Ok(f(page)),
            None => Err(PageCacheError::OutOfBounds { page_id, offset: 0, length: 0 }),
        }
    }

    fn check_bounds(&self, page_id: PageId, offset: usize, length: usize) -> Result<()> {
        if offset + length > self.page_size {
            return Err(PageCacheError::OutOfBounds { page_id, offset, length });
        }
        Ok(())
    }

    /// Read `buf.len()` bytes at `offset` within the page
    pub fn read(&self, page_id: PageId, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.check_bounds(page_id, offset, buf.len())?;
        self.with_page(page_id, |page| {
            buf.copy_from_slice(&page.data[offset..offset + buf.len()]);
        })
    }

    /// Write `data` at `offset` within the page, marking it dirty
    pub fn write(&self, page_id: PageId, offset: usize, data: &[u8]) -> Result<()> {
        self.check_bounds(page_id, offset, data.len())?;
        self.with_page(page_id, |page| {
            page.data[offset..offset + data.len()].copy_from_slice(data);
            page.is_dirty = true;
        })
    }

    /// Write back every dirty page and sync the file
    pub fn flush(&self) -> Result<()> {
        let mut resident = self.resident.lock();
        let mut written = 0;
        for page in resident.pages.values_mut().filter(|p| p.is_dirty) {
            self.disk_manager.write_page(page)?;
            page.is_dirty = false;
            written += 1;
        }
        self.disk_manager.sync()?;
        self.tracer.flush();
        debug!("Flushed {} pages of {:?}", written, self.disk_manager.path());
        Ok(())
    }

    /// Flush and release the file
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    /// Number of pages in the file, including dirty pages not yet written
    pub fn page_count(&self) -> Result<u64> {
        let on_disk = self.disk_manager.page_count()?;
        let resident = self.resident.lock();
        let in_memory = resident
            .pages
            .values()
            .filter(|p| p.is_dirty)
            .map(|p| p.page_id + 1)
            .max()
            .unwrap_or(0);
        Ok(on_disk.max(in_memory))
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn path(&self) -> &Path {
        self.disk_manager.path()
    }
}
