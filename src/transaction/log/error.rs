use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::common::types::LogVersion;
use super::log_position::LogPosition;

/// Error type for log file operations
#[derive(Error, Debug)]
pub enum LogError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Invalid log file header in {0}")]
    InvalidHeader(PathBuf),

    #[error("Corrupt log entry at {position}: {reason}")]
    Corrupt { position: LogPosition, reason: String },

    #[error("Failed to serialize log entry: {0}")]
    SerializationError(String),

    #[error("Log file for version {version} is missing: {path}")]
    MissingLogVersion { version: LogVersion, path: PathBuf },

    #[error("Invalid log state: {0}")]
    InvalidState(String),

    #[error("A transaction needs at least one command")]
    EmptyTransaction,
}

/// Result type for log file operations
pub type Result<T> = std::result::Result<T, LogError>;
