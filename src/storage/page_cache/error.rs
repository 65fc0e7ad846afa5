use std::path::PathBuf;
use thiserror::Error;

use crate::storage::disk::DiskManagerError;

#[derive(Error, Debug)]
pub enum PageCacheError {
    #[error("No such file: {0}")]
    NoSuchFile(PathBuf),
    #[error("Disk manager error: {0}")]
    DiskManagerError(DiskManagerError),
    #[error("Access outside page bounds: page {page_id}, offset {offset}, length {length}")]
    OutOfBounds { page_id: u64, offset: usize, length: usize },
}

impl From<DiskManagerError> for PageCacheError {
    fn from(e: DiskManagerError) -> Self {
        match e {
            DiskManagerError::NoSuchFile(path) => PageCacheError::NoSuchFile(path),
            other => PageCacheError::DiskManagerError(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PageCacheError>;
