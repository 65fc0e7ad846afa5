use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::storage::error::StoreError;
use crate::storage::id::IdError;
use crate::storage::metadata::MetaDataError;
use crate::transaction::checkpoint::CheckpointError;
use crate::transaction::log::LogError;

/// Raised when the availability guard shut the database down while it was
/// still starting
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Database start was aborted: {reason}")]
pub struct DatabaseStartAborted {
    pub reason: String,
}

/// Error type for recovery
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error(
        "Transaction logs are missing and recovery is not possible. {0} \
         To force recovery, start with fail_on_missing_files disabled."
    )]
    MissingLogs(String),

    #[error("{} is(are) missing and recovery is not possible", display_files(.files))]
    MissingStoreFiles { files: Vec<PathBuf> },

    #[error("Failed to read the transaction log")]
    LogRead(#[source] LogError),

    #[error("Failed to append the recovery checkpoint")]
    CheckpointAppend(#[source] CheckpointError),

    #[error(transparent)]
    Aborted(#[from] DatabaseStartAborted),

    #[error("Transaction log error: {0}")]
    LogError(#[from] LogError),

    #[error("Checkpoint log error: {0}")]
    CheckpointError(#[from] CheckpointError),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Id file error: {0}")]
    IdError(#[from] IdError),

    #[error("Metadata store error: {0}")]
    MetaDataError(#[from] MetaDataError),
}

impl RecoveryError {
    /// Whether recovery stopped because the database was shut down
    pub fn is_aborted(&self) -> bool {
        matches!(self, RecoveryError::Aborted(_))
    }

    /// Message of the innermost error in the source chain
    pub fn root_cause_message(&self) -> String {
        root_cause(self).to_string()
    }
}

/// Innermost error of a source chain
pub fn root_cause<'a>(error: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}

fn display_files(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| f.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for recovery
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Error type for the read-only recovery check
#[derive(Error, Debug)]
pub enum RecoveryCheckError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Transaction log error: {0}")]
    LogError(#[from] LogError),

    #[error("Checkpoint log error: {0}")]
    CheckpointError(#[from] CheckpointError),

    #[error("Id file error: {0}")]
    IdError(#[from] IdError),

    #[error("Metadata store error: {0}")]
    MetaDataError(#[from] MetaDataError),
}

/// Failures while locating the recovery start
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("Transaction log error: {0}")]
    LogError(#[from] LogError),

    #[error("Failed to read the transaction log: {0}")]
    LogRead(LogError),

    #[error("Checkpoint log error: {0}")]
    CheckpointError(#[from] CheckpointError),
}

impl From<LocateError> for RecoveryError {
    fn from(error: LocateError) -> Self {
        match error {
            LocateError::LogError(e) => RecoveryError::LogError(e),
            LocateError::LogRead(e) => RecoveryError::LogRead(e),
            LocateError::CheckpointError(e) => RecoveryError::CheckpointError(e),
        }
    }
}

impl From<LocateError> for RecoveryCheckError {
    fn from(error: LocateError) -> Self {
        match error {
            LocateError::LogError(e) | LocateError::LogRead(e) => RecoveryCheckError::LogError(e),
            LocateError::CheckpointError(e) => RecoveryCheckError::CheckpointError(e),
        }
    }
}
