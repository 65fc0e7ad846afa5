use std::io;
use thiserror::Error;

use crate::transaction::log::LogError;

/// Error type for checkpoint log operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Checkpoint log error: {0}")]
    LogError(#[from] LogError),

    #[error("Invalid checkpoint log state: {0}")]
    InvalidState(String),
}

/// Result type for checkpoint log operations
pub type Result<T> = std::result::Result<T, CheckpointError>;
