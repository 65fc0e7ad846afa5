// BayunGraph Record Store
//
// Fixed-size records laid out back to back in pages of a paged file.
// Records never straddle a page boundary.

use std::marker::PhantomData;
use std::path::Path;

use crate::common::types::{PageId, RecordId, PAGE_SIZE};
use crate::storage::error::{Result, StoreError};
use crate::storage::page_cache::{PageCache, PageCacheError, PagedFile};
use crate::storage::record::Record;

/// A store of fixed-size records of type `R`
pub struct RecordStore<R: Record> {
    file: PagedFile,
    _record: PhantomData<R>,
}

impl<R: Record> RecordStore<R> {
    /// Records per page
    pub const RECORDS_PER_PAGE: u64 = (PAGE_SIZE / R::RECORD_SIZE) as u64;

    /// Open an existing store file, or create it if `create` is set
    pub fn open(page_cache: &PageCache, path: &Path, create: bool) -> Result<Self> {
        let file = page_cache.map(path, PAGE_SIZE, create).map_err(|e| match e {
            PageCacheError::NoSuchFile(p) => StoreError::MissingStoreFile(p),
            other => StoreError::PageCacheError(other),
        })?;
        Ok(Self {
            file,
            _record: PhantomData,
        })
    }

    fn location(id: RecordId) -> (PageId, usize) {
        let page_id = id / Self::RECORDS_PER_PAGE;
        let offset = (id % Self::RECORDS_PER_PAGE) as usize * R::RECORD_SIZE;
        (page_id, offset)
    }

    /// Read the record with the given id. Ids beyond the end of the store
    /// read as unused records.
    pub fn get_record(&self, id: RecordId) -> Result<R> {
        let (page_id, offset) = Self::location(id);
        let mut buf = vec![0u8; R::RECORD_SIZE];
        self.file.read(page_id, offset, &mut buf)?;
        Ok(R::decode(id, &buf))
    }

    /// Write a record at its id
    pub fn update_record(&self, record: &R) -> Result<()> {
        let (page_id, offset) = Self::location(record.id());
        let mut buf = vec![0u8; R::RECORD_SIZE];
        record.encode(&mut buf);
        self.file.write(page_id, offset, &buf)?;
        Ok(())
    }

    /// Number of record slots the store file spans
    pub fn capacity(&self) -> Result<u64> {
        Ok(self.file.page_count()? * Self::RECORDS_PER_PAGE)
    }

    /// One past the highest in-use record id
    pub fn high_id(&self) -> Result<u64> {
        let mut id = self.capacity()?;
        while id > 0 {
            if self.get_record(id - 1)?.in_use() {
                return Ok(id);
            }
            id -= 1;
        }
        Ok(0)
    }

    /// Ids of all in-use records below `high_id`
    pub fn in_use_ids(&self, high_id: u64) -> Result<Vec<RecordId>> {
        let mut ids = Vec::new();
        for id in 0..high_id {
            if self.get_record(id)?.in_use() {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    pub fn flush(&self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
