use std::path::PathBuf;
use thiserror::Error;

use crate::storage::id::IdError;
use crate::storage::metadata::MetaDataError;
use crate::storage::page_cache::PageCacheError;

/// Error type for record store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Page cache error: {0}")]
    PageCacheError(#[from] PageCacheError),

    #[error("Id file error: {0}")]
    IdError(#[from] IdError),

    #[error("Metadata store error: {0}")]
    MetaDataError(#[from] MetaDataError),

    #[error("Store file {0} does not exist")]
    MissingStoreFile(PathBuf),
}

/// Result type for record store operations
pub type Result<T> = std::result::Result<T, StoreError>;
