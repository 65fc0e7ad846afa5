use std::path::PathBuf;
use thiserror::Error;

use crate::storage::layout::StoreType;

/// Error type for id file operations
#[derive(Error, Debug)]
pub enum IdError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Id file {0} does not exist")]
    Missing(PathBuf),

    #[error("Invalid id file header in {0}")]
    InvalidHeader(PathBuf),

    #[error("No id generator open for the {0} store")]
    NotOpen(StoreType),
}

/// Result type for id file operations
pub type Result<T> = std::result::Result<T, IdError>;
