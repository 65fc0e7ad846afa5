// BayunGraph Recovery Start Locator
//
// Finds the position forward replay starts from and whether anything was
// committed after it.

use log::{debug, warn};

use crate::common::types::{TxId, BASE_TX_ID};
use crate::transaction::checkpoint::{CheckpointFile, CheckpointInfo};
use crate::transaction::log::{LogFiles, LogPosition, TransactionCursor};
use super::error::LocateError;

/// Where recovery starts and what it will find there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryStartInformation {
    /// Committed transactions exist after the start position
    pub recovery_required: bool,
    pub start_position: LogPosition,
    pub first_tx_id_after_start: Option<TxId>,
    /// The checkpoint the start position came from
    pub checkpoint: Option<CheckpointInfo>,
    /// Log segments recovery depends on are absent
    pub missing_logs: Option<String>,
    /// Some id generator is dirty or missing. Kept apart from
    /// `recovery_required`, which only covers committed transactions.
    pub id_generators_need_repair: bool,
}

impl RecoveryStartInformation {
    /// Whether recovery has any work to do, repairs included
    pub fn needs_recovery(&self) -> bool {
        self.recovery_required || self.missing_logs.is_some() || self.id_generators_need_repair
    }
}

/// Locates the recovery start over one transaction log and checkpoint log
pub struct RecoveryStartLocator<'a> {
    log_files: &'a LogFiles,
    checkpoint_file: &'a CheckpointFile,
}

impl<'a> RecoveryStartLocator<'a> {
    pub fn new(log_files: &'a LogFiles, checkpoint_file: &'a CheckpointFile) -> Self {
        Self {
            log_files,
            checkpoint_file,
        }
    }

    /// `last_committed_tx_id` is what the metadata store recorded;
    /// `id_generators_need_repair` is passed through as the advisory flag.
    /// Missing logs are reported in the result rather than as an error, so
    /// the caller can apply its own policy.
    pub fn locate(
        &self,
        last_committed_tx_id: TxId,
        id_generators_need_repair: bool,
    ) -> Result<RecoveryStartInformation, LocateError> {
        let checkpoint = self.checkpoint_file.find_latest_checkpoint()?;
        let versions = self.log_files.versions()?;

        let (start_position, missing_logs) = match &checkpoint {
            Some(checkpoint) => {
                let start = checkpoint.transaction_log_position;
                debug!("Last checkpoint {} points at {}", checkpoint.entry_position, start);
                (start, self.missing_after_checkpoint(start, &versions))
            }
            None => match versions.first() {
                Some(lowest) => {
                    let start = LogPosition::start_of(*lowest);
                    (start, self.missing_without_checkpoint(*lowest, &versions)?)
                }
                None if last_committed_tx_id > BASE_TX_ID => (
                    LogPosition::start_of(0),
                    Some(format!(
                        "No transaction logs found in {:?}, but transaction {} was committed.",
                        self.log_files.dir(),
                        last_committed_tx_id
                    )),
                ),
                None => (LogPosition::start_of(0), None),
            },
        };

        if let Some(missing) = &missing_logs {
            warn!("Transaction logs needed for recovery are missing: {}", missing);
            return Ok(RecoveryStartInformation {
                recovery_required: true,
                start_position,
                first_tx_id_after_start: None,
                checkpoint,
                missing_logs,
                id_generators_need_repair,
            });
        }

        let first_tx_id_after_start = match TransactionCursor::open(self.log_files.clone(), start_position)?.next() {
            Some(tx) => Some(tx.map_err(LocateError::LogRead)?.tx_id),
            None => None,
        };

        Ok(RecoveryStartInformation {
            recovery_required: first_tx_id_after_start.is_some(),
            start_position,
            first_tx_id_after_start,
            checkpoint,
            missing_logs: None,
            id_generators_need_repair,
        })
    }

    fn missing_after_checkpoint(&self, start: LogPosition, versions: &[u64]) -> Option<String> {
        if !self.log_files.version_exists(start.log_version) {
            return Some(format!(
                "Last checkpoint points at {}, but {:?} does not exist.",
                start,
                self.log_files.path_for(start.log_version)
            ));
        }
        let highest = versions.last().copied().unwrap_or(start.log_version);
        let gaps = self.log_files.missing_versions(start.log_version, highest);
        if gaps.is_empty() {
            None
        } else {
            Some(format!("Log versions {:?} after the last checkpoint are missing.", gaps))
        }
    }

    fn missing_without_checkpoint(&self, lowest: u64, versions: &[u64]) -> Result<Option<String>, LocateError> {
        // Without a checkpoint every transaction since store creation is needed
        let header = self.log_files.extract_header(lowest)?;
        if header.last_committed_tx_id > BASE_TX_ID {
            return Ok(Some(format!(
                "No checkpoint found and the oldest log {:?} starts after transaction {}.",
                self.log_files.path_for(lowest),
                header.last_committed_tx_id
            )));
        }
        let highest = versions.last().copied().unwrap_or(lowest);
        let gaps = self.log_files.missing_versions(lowest, highest);
        if gaps.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("Log versions {:?} are missing.", gaps)))
        }
    }
}
