// BayunGraph Transaction Log Writer
//
// Appends committed transactions to the highest segment of the transaction
// log. A transaction is written as `Start → Command* → Commit` in a single
// write, and the log only rotates between transactions. A failed write is
// cut back off the segment so the next transaction starts on a boundary.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use parking_lot::Mutex;
use log::{debug, error, info};

use crate::common::config::TransactionLogConfig;
use crate::common::types::{LogVersion, TxId};
use super::error::{LogError, Result};
use super::log_entry::{Command, LogEntry};
use super::log_file_header::LogFileHeader;
use super::log_files::LogFiles;
use super::log_position::LogPosition;

/// Where an appended transaction landed in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendedTransaction {
    pub tx_id: TxId,
    pub start_position: LogPosition,
    /// Position right after the commit entry
    pub end_position: LogPosition,
}

struct WriterState {
    file: File,
    version: LogVersion,
    position: u64,
    last_committed_tx_id: TxId,
    /// Set when a failed write could not be rolled back
    poisoned: bool,
}

impl WriterState {
    fn write_transaction(&mut self, bytes: &[u8], force_sync: bool) -> io::Result<()> {
        self.file.write_all(bytes)?;
        if force_sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Drop whatever part of a failed write reached the segment
    fn discard_partial_write(&mut self) {
        let rewound = self
            .file
            .set_len(self.position)
            .and_then(|_| self.file.seek(SeekFrom::Start(self.position)));
        if let Err(e) = rewound {
            error!(
                "Could not roll back a failed write at {}: {}",
                LogPosition::new(self.version, self.position),
                e
            );
            self.poisoned = true;
        }
    }
}

/// Appender for the transaction log
pub struct TransactionLogWriter {
    files: LogFiles,
    config: TransactionLogConfig,
    store_id: u64,
    state: Mutex<WriterState>,
}

impl TransactionLogWriter {
    /// Open the highest existing segment for appending, or create segment
    /// `initial_version` if the log is empty
    pub fn open(
        files: LogFiles,
        config: TransactionLogConfig,
        store_id: u64,
        last_committed_tx_id: TxId,
        initial_version: LogVersion,
    ) -> Result<Self> {
        let (file, version) = match files.highest_version()? {
            Some(version) => (files.open_for_append(version)?, version),
            None => (
                files.create_segment(initial_version, last_committed_tx_id, store_id)?,
                initial_version,
            ),
        };
        let position = file.metadata()?.len();
        debug!(
            "Transaction log writer positioned at {}, last committed tx {}",
            LogPosition::new(version, position),
            last_committed_tx_id
        );

        Ok(Self {
            files,
            config,
            store_id,
            state: Mutex::new(WriterState {
                file,
                version,
                position,
                last_committed_tx_id,
                poisoned: false,
            }),
        })
    }

    pub fn files(&self) -> &LogFiles {
        &self.files
    }

    /// Position at which the next transaction will start
    pub fn current_position(&self) -> LogPosition {
        let state = self.state.lock();
        LogPosition::new(state.version, state.position)
    }

    pub fn current_version(&self) -> LogVersion {
        self.state.lock().version
    }

    pub fn last_committed_tx_id(&self) -> TxId {
        self.state.lock().last_committed_tx_id
    }

    /// Append one transaction and assign it the next transaction id. A
    /// transaction needs at least one command.
    pub fn append_transaction(&self, commands: &[Command]) -> Result<AppendedTransaction> {
        if commands.is_empty() {
            return Err(LogError::EmptyTransaction);
        }
        let mut state = self.state.lock();
        if state.poisoned {
            return Err(LogError::InvalidState(
                "The transaction log writer failed earlier and cannot append".to_string(),
            ));
        }

        if state.position >= self.config.rotation_threshold
            && state.position > LogFileHeader::HEADER_SIZE as u64
        {
            self.rotate_locked(&mut state)?;
        }

        let tx_id = state.last_committed_tx_id + 1;
        let mut bytes = LogEntry::start(state.last_committed_tx_id).encode()?;
        for command in commands {
            bytes.extend_from_slice(&LogEntry::Command(command.clone()).encode()?);
        }
        bytes.extend_from_slice(&LogEntry::commit(tx_id).encode()?);

        if let Err(e) = state.write_transaction(&bytes, self.config.force_sync) {
            state.discard_partial_write();
            return Err(e.into());
        }

        let start_position = LogPosition::new(state.version, state.position);
        state.position += bytes.len() as u64;
        state.last_committed_tx_id = tx_id;

        Ok(AppendedTransaction {
            tx_id,
            start_position,
            end_position: LogPosition::new(state.version, state.position),
        })
    }

    /// Start a new segment. The new header records the last committed
    /// transaction of all previous segments.
    pub fn rotate(&self) -> Result<LogVersion> {
        let mut state = self.state.lock();
        self.rotate_locked(&mut state)?;
        Ok(state.version)
    }

    fn rotate_locked(&self, state: &mut WriterState) -> Result<()> {
        state.file.sync_all()?;
        let next_version = state
            .version
            .checked_add(1)
            .ok_or_else(|| LogError::InvalidState("Log version overflow".to_string()))?;
        let file = self
            .files
            .create_segment(next_version, state.last_committed_tx_id, self.store_id)?;

        info!("Rotated transaction log from version {} to {}", state.version, next_version);
        state.file = file;
        state.version = next_version;
        state.position = LogFileHeader::HEADER_SIZE as u64;
        Ok(())
    }

    /// Force everything written so far to disk
    pub fn sync(&self) -> Result<()> {
        self.state.lock().file.sync_all()?;
        Ok(())
    }
}
