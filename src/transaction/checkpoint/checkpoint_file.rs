// BayunGraph Checkpoint File
//
// Reads and appends checkpoint records. Checkpoint segments share the
// header and entry framing of the transaction log but only ever hold
// checkpoint entries.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use parking_lot::Mutex;
use log::{debug, info, warn};

use crate::common::config::CheckpointConfig;
use crate::common::types::{LogVersion, INITIAL_LOG_VERSION};
use crate::transaction::log::{LogEntry, LogFileHeader, LogFiles, LogPosition};
use super::error::{CheckpointError, Result};

/// A checkpoint record read from or written to the checkpoint log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointInfo {
    /// Transaction log position recovery would replay from
    pub transaction_log_position: LogPosition,
    pub timestamp: u64,
    pub reason: String,
    /// Where the record itself sits in the checkpoint log
    pub entry_position: LogPosition,
}

impl CheckpointInfo {
    pub fn checkpoint_log_version(&self) -> LogVersion {
        self.entry_position.log_version
    }
}

/// Decide which checkpoint segment is current, given what the metadata
/// store recorded. Existing segments win; without any, a negative counter
/// is reset to the initial version and a non-negative one is kept.
pub fn resolve_checkpoint_log_version(files: &LogFiles, stored: Option<i64>) -> Result<LogVersion> {
    if let Some(highest) = files.highest_version()? {
        return Ok(highest);
    }
    match stored {
        Some(value) if value >= 0 => Ok(value as LogVersion),
        Some(value) => {
            warn!(
                "Checkpoint log version {} is not a valid version and no checkpoint files exist, resetting it to {}",
                value, INITIAL_LOG_VERSION
            );
            Ok(INITIAL_LOG_VERSION)
        }
        None => Ok(INITIAL_LOG_VERSION),
    }
}

struct AppendState {
    file: Option<File>,
    version: LogVersion,
    position: u64,
}

impl AppendState {
    /// Cut a failed append back off the segment. If that fails as well the
    /// segment is reopened, and its tail dropped, on the next append.
    fn discard_partial_write(&mut self) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let position = self.position;
        if let Err(e) = file.set_len(position).and_then(|_| file.seek(SeekFrom::Start(position))) {
            warn!("Could not roll back a failed checkpoint append: {}", e);
            self.file = None;
        }
    }
}

/// The checkpoint log of one database
pub struct CheckpointFile {
    files: LogFiles,
    config: CheckpointConfig,
    store_id: u64,
    state: Mutex<AppendState>,
}

impl CheckpointFile {
    /// `current_version` is the segment new checkpoints go to, normally
    /// from `resolve_checkpoint_log_version`
    pub fn new(files: LogFiles, config: CheckpointConfig, store_id: u64, current_version: LogVersion) -> Self {
        Self {
            files,
            config,
            store_id,
            state: Mutex::new(AppendState {
                file: None,
                version: current_version,
                position: 0,
            }),
        }
    }

    pub fn files(&self) -> &LogFiles {
        &self.files
    }

    /// Segment the next checkpoint is appended to
    pub fn current_version(&self) -> LogVersion {
        self.state.lock().version
    }

    /// Checkpoint records of one segment in order, plus the position right
    /// after the last readable entry
    fn read_segment(&self, version: LogVersion) -> Result<(Vec<CheckpointInfo>, LogPosition)> {
        let mut reader = self.files.open_reader(version)?;
        let mut checkpoints = Vec::new();
        while let Some(positioned) = reader.next_entry()? {
            match positioned.entry {
                LogEntry::CheckPoint(entry) => checkpoints.push(CheckpointInfo {
                    transaction_log_position: entry.log_position,
                    timestamp: entry.timestamp,
                    reason: entry.reason,
                    entry_position: positioned.position,
                }),
                other => debug!("Ignoring non-checkpoint entry {:?} at {}", other, positioned.position),
            }
        }
        Ok((checkpoints, reader.position()))
    }

    /// The most recent checkpoint: the last record of the last segment,
    /// looking at earlier segments only when later ones hold none
    pub fn find_latest_checkpoint(&self) -> Result<Option<CheckpointInfo>> {
        for version in self.files.versions()?.into_iter().rev() {
            let (mut checkpoints, _) = self.read_segment(version)?;
            if let Some(latest) = checkpoints.pop() {
                return Ok(Some(latest));
            }
            debug!("Checkpoint log version {} holds no checkpoints", version);
        }
        Ok(None)
    }

    /// Every readable checkpoint, oldest first
    pub fn reachable_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        let mut all = Vec::new();
        for version in self.files.versions()? {
            all.extend(self.read_segment(version)?.0);
        }
        Ok(all)
    }

    /// Durably append a checkpoint for `position`
    pub fn append(&self, position: LogPosition, reason: &str) -> Result<CheckpointInfo> {
        let mut state = self.state.lock();
        if state.file.is_none() {
            self.open_current(&mut state)?;
        }
        if state.position >= self.config.rotation_threshold
            && state.position > LogFileHeader::HEADER_SIZE as u64
        {
            self.rotate(&mut state)?;
        }

        let entry = LogEntry::checkpoint(position, reason);
        let bytes = entry.encode()?;
        let entry_position = LogPosition::new(state.version, state.position);
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| CheckpointError::InvalidState("Checkpoint file is not open".to_string()))?;
        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_data()) {
            state.discard_partial_write();
            return Err(e.into());
        }
        state.position += bytes.len() as u64;

        info!("Checkpoint at {} written to {} ({})", position, entry_position, reason);
        let LogEntry::CheckPoint(written) = entry else {
            return Err(CheckpointError::InvalidState("Expected a checkpoint entry".to_string()));
        };
        Ok(CheckpointInfo {
            transaction_log_position: written.log_position,
            timestamp: written.timestamp,
            reason: written.reason,
            entry_position,
        })
    }

    fn open_current(&self, state: &mut AppendState) -> Result<()> {
        let version = state.version;
        if self.files.version_exists(version) && !self.files.has_torn_header(version)? {
            // Drop a torn tail left by a crash during a previous append
            let (_, end) = self.read_segment(version)?;
            self.files.truncate(end)?;
            state.file = Some(self.files.open_for_append(version)?);
            state.position = end.byte_offset;
        } else {
            state.file = Some(self.files.create_segment(version, 0, self.store_id)?);
            state.position = LogFileHeader::HEADER_SIZE as u64;
        }
        Ok(())
    }

    fn rotate(&self, state: &mut AppendState) -> Result<()> {
        let next_version = state.version + 1;
        state.file = Some(self.files.create_segment(next_version, 0, self.store_id)?);
        info!("Rotated checkpoint log from version {} to {}", state.version, next_version);
        state.version = next_version;
        state.position = LogFileHeader::HEADER_SIZE as u64;
        Ok(())
    }
}
