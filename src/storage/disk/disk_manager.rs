use std::fs::{File, OpenOptions};
use std::io::{Read, Write, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Page, PageId};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("No such file: {0}")]
    NoSuchFile(PathBuf),
}

/// DiskManager is responsible for the actual disk I/O of one paged file
pub struct DiskManager {
    file: Mutex<File>,
    path: PathBuf,
    page_size: usize,
}

impl DiskManager {
    /// Open the file at `path`. A missing file is created only if `create` is set.
    pub fn new(path: impl AsRef<Path>, page_size: usize, create: bool) -> Result<Self, DiskManagerError> {
        let path = path.as_ref();
        if !create && !path.exists() {
            return Err(DiskManagerError::NoSuchFile(path.to_path_buf()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            page_size,
        })
    }

    /// Read a page from disk. Pages beyond the end of the file read as zeroes.
    pub fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<(), DiskManagerError> {
        let offset = self.page_offset(page_id);
        let mut file = self.file.lock();

        let file_size = file.metadata()?.len();
        page.page_id = page_id;
        page.data.iter_mut().for_each(|b| *b = 0);

        if offset >= file_size {
            return Ok(());
        }

        // The last page of a file may be short
        let available = ((file_size - offset) as usize).min(self.page_size);
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut page.data[..available])?;

        Ok(())
    }

    /// Write a page to disk
    pub fn write_page(&self, page: &Page) -> Result<(), DiskManagerError> {
        let offset = self.page_offset(page.page_id);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.data)?;
        file.flush()?;

        Ok(())
    }

    /// Force written pages to stable storage
    pub fn sync(&self) -> Result<(), DiskManagerError> {
        self.file.lock().sync_data()?;
        Ok(())
    }

    /// Number of pages the file currently spans, counting a trailing partial page
    pub fn page_count(&self) -> Result<u64, DiskManagerError> {
        let len = self.file.lock().metadata()?.len();
        Ok(len.div_ceil(self.page_size as u64))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Calculate the offset of a page in the file
    fn page_offset(&self, page_id: PageId) -> u64 {
        page_id * self.page_size as u64
    }
}
