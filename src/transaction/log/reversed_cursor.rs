// BayunGraph Reversed Transaction Cursor
//
// Yields committed transactions newest first, from the end of the highest
// segment back to a lower-bound position. One segment at a time is read
// forward into memory and then drained from the back.

use log::debug;

use crate::common::types::LogVersion;
use super::error::{LogError, Result};
use super::log_files::LogFiles;
use super::log_position::LogPosition;
use super::transaction_cursor::{CommittedTransaction, TransactionCursor};

/// Backward cursor over committed transactions
pub struct ReversedTransactionCursor {
    files: LogFiles,
    lower_bound: LogPosition,
    current_version: Option<LogVersion>,
    window: Vec<CommittedTransaction>,
    done: bool,
}

impl ReversedTransactionCursor {
    /// Cursor over every transaction at or after `lower_bound`
    pub fn open(files: LogFiles, lower_bound: LogPosition) -> Result<Self> {
        let current_version = files
            .highest_version()?
            .filter(|highest| *highest >= lower_bound.log_version);
        Ok(Self {
            files,
            lower_bound,
            current_version,
            window: Vec::new(),
            done: false,
        })
    }

    /// Load the next non-empty segment window. Returns false when there is
    /// nothing left above the lower bound.
    fn load_previous_segment(&mut self) -> Result<bool> {
        while let Some(version) = self.current_version {
            self.current_version = if version > self.lower_bound.log_version {
                Some(version - 1)
            } else {
                None
            };

            if !self.files.version_exists(version) {
                return Err(LogError::MissingLogVersion {
                    version,
                    path: self.files.path_for(version),
                });
            }

            // Lineage of the segment, so the single-segment cursor checks
            // every transaction against it
            let header = self.files.extract_header(version)?;
            let start = if version == self.lower_bound.log_version {
                self.lower_bound
            } else {
                LogPosition::start_of(version)
            };

            let transactions = TransactionCursor::single_segment(self.files.clone(), start)?
                .collect::<Result<Vec<_>>>()?;
            debug!(
                "Reverse cursor loaded {} transactions from log version {} (previous last tx {})",
                transactions.len(),
                version,
                header.last_committed_tx_id
            );
            if !transactions.is_empty() {
                self.window = transactions;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_previous(&mut self) -> Result<Option<CommittedTransaction>> {
        if let Some(tx) = self.window.pop() {
            return Ok(Some(tx));
        }
        if self.load_previous_segment()? {
            return Ok(self.window.pop());
        }
        Ok(None)
    }
}

impl Iterator for ReversedTransactionCursor {
    type Item = Result<CommittedTransaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_previous() {
            Ok(Some(tx)) => Some(Ok(tx)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
