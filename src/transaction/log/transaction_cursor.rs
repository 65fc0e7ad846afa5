// BayunGraph Transaction Cursor
//
// Forward iteration over committed transactions, across segment boundaries.
// Entries are grouped per transaction; a transaction without its commit
// entry at the end of a segment is a crash artifact and is dropped.

use log::{debug, warn};

use crate::common::types::{LogVersion, TxId};
use super::entry_reader::LogEntryReader;
use super::error::{LogError, Result};
use super::log_entry::{Command, LogEntry};
use super::log_files::LogFiles;
use super::log_position::LogPosition;

/// A transaction read back from the log
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedTransaction {
    pub tx_id: TxId,
    /// Position of the start entry
    pub start_position: LogPosition,
    /// Position right after the commit entry
    pub end_position: LogPosition,
    pub commands: Vec<Command>,
    pub time_committed: u64,
}

struct PendingTransaction {
    start_position: LogPosition,
    commands: Vec<Command>,
}

/// Forward cursor over committed transactions starting at a log position
pub struct TransactionCursor {
    files: LogFiles,
    reader: Option<LogEntryReader>,
    next_version: LogVersion,
    highest_version: Option<LogVersion>,
    pending: Option<PendingTransaction>,
    last_committed_end: LogPosition,
    discarded: usize,
    done: bool,
}

impl TransactionCursor {
    /// Cursor from `start` to the end of the highest segment
    pub fn open(files: LogFiles, start: LogPosition) -> Result<Self> {
        let highest_version = files.highest_version()?;
        Self::open_until(files, start, highest_version)
    }

    /// Cursor over the transactions of `start`'s segment only
    pub fn single_segment(files: LogFiles, start: LogPosition) -> Result<Self> {
        Self::open_until(files, start, Some(start.log_version))
    }

    fn open_until(files: LogFiles, start: LogPosition, highest_version: Option<LogVersion>) -> Result<Self> {
        let mut cursor = Self {
            files,
            reader: None,
            next_version: start.log_version,
            highest_version,
            pending: None,
            last_committed_end: start,
            discarded: 0,
            done: false,
        };
        match highest_version {
            Some(highest) if start.log_version <= highest => {
                let mut reader = cursor.files.open_reader(start.log_version)?;
                reader.seek(start.byte_offset)?;
                cursor.reader = Some(reader);
                cursor.next_version = start.log_version + 1;
            }
            _ => cursor.done = true,
        }
        Ok(cursor)
    }

    /// Position right after the last complete transaction read so far, or
    /// the start position if none was read
    pub fn last_committed_end(&self) -> LogPosition {
        self.last_committed_end
    }

    /// Number of incomplete transactions dropped so far
    pub fn discarded_transactions(&self) -> usize {
        self.discarded
    }

    fn discard_pending(&mut self, why: &str) {
        if let Some(pending) = self.pending.take() {
            warn!(
                "Discarding incomplete transaction starting at {} ({} commands): {}",
                pending.start_position,
                pending.commands.len(),
                why
            );
            self.discarded += 1;
        }
    }

    fn advance_segment(&mut self) -> Result<bool> {
        let Some(highest) = self.highest_version else {
            return Ok(false);
        };
        if self.next_version > highest {
            return Ok(false);
        }
        let version = self.next_version;
        if !self.files.version_exists(version) {
            return Err(LogError::MissingLogVersion {
                version,
                path: self.files.path_for(version),
            });
        }
        debug!("Transaction cursor moving to log version {}", version);
        self.reader = Some(self.files.open_reader(version)?);
        self.next_version = version + 1;
        Ok(true)
    }

    fn read_next(&mut self) -> Result<Option<CommittedTransaction>> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            let previous_last_tx = reader.header().last_committed_tx_id;

            let Some(positioned) = reader.next_entry()? else {
                self.discard_pending("end of log segment");
                self.reader = None;
                if !self.advance_segment()? {
                    return Ok(None);
                }
                continue;
            };

            match positioned.entry {
                LogEntry::Start(_) => {
                    self.discard_pending("followed by another start entry");
                    self.pending = Some(PendingTransaction {
                        start_position: positioned.position,
                        commands: Vec::new(),
                    });
                }
                LogEntry::Command(command) => match self.pending.as_mut() {
                    Some(pending) => pending.commands.push(command),
                    None => {
                        return Err(LogError::Corrupt {
                            position: positioned.position,
                            reason: "command entry outside of a transaction".to_string(),
                        });
                    }
                },
                LogEntry::Commit(commit) => {
                    let Some(pending) = self.pending.take() else {
                        return Err(LogError::Corrupt {
                            position: positioned.position,
                            reason: format!("commit of transaction {} without a start entry", commit.tx_id),
                        });
                    };
                    if commit.tx_id <= previous_last_tx {
                        return Err(LogError::Corrupt {
                            position: positioned.position,
                            reason: format!(
                                "transaction {} is not newer than the segment's previous last committed transaction {}",
                                commit.tx_id, previous_last_tx
                            ),
                        });
                    }
                    self.last_committed_end = positioned.next_position;
                    return Ok(Some(CommittedTransaction {
                        tx_id: commit.tx_id,
                        start_position: pending.start_position,
                        end_position: positioned.next_position,
                        commands: pending.commands,
                        time_committed: commit.time_written,
                    }));
                }
                LogEntry::CheckPoint(_) => {
                    debug!("Skipping checkpoint entry at {}", positioned.position);
                }
            }
        }
    }
}

impl Iterator for TransactionCursor {
    type Item = Result<CommittedTransaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use crate::common::config::TransactionLogConfig;
    use crate::storage::record::NodeRecord;
    use crate::transaction::log::log_writer::TransactionLogWriter;

    fn writer(temp_dir: &TempDir) -> TransactionLogWriter {
        let config = TransactionLogConfig::default();
        let files = LogFiles::new(temp_dir.path(), config.log_file_base_name.clone());
        TransactionLogWriter::open(files, config, 1, 1, 0).unwrap()
    }

    fn node(id: u64) -> Vec<Command> {
        vec![Command::Node(NodeRecord::new(id, 0))]
    }

    #[test]
    fn test_reads_across_segments() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(&temp_dir);
        writer.append_transaction(&node(0)).unwrap();
        writer.rotate().unwrap();
        writer.rotate().unwrap();
        writer.append_transaction(&node(1)).unwrap();
        writer.append_transaction(&node(2)).unwrap();

        let cursor = TransactionCursor::open(writer.files().clone(), LogPosition::start_of(0)).unwrap();
        let ids: Vec<TxId> = cursor.map(|tx| tx.unwrap().tx_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_starts_after_position() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(&temp_dir);
        let first = writer.append_transaction(&node(0)).unwrap();
        writer.append_transaction(&node(1)).unwrap();

        let mut cursor = TransactionCursor::open(writer.files().clone(), first.end_position).unwrap();
        let tx = cursor.next().unwrap().unwrap();
        assert_eq!(tx.tx_id, 3);
        assert_eq!(tx.commands, node(1));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_incomplete_tail_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(&temp_dir);
        let committed = writer.append_transaction(&node(0)).unwrap();

        // A transaction that never reached its commit entry
        let path = writer.files().path_for(0);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&LogEntry::start(2).encode().unwrap()).unwrap();
        file.write_all(&LogEntry::Command(node(1).remove(0)).encode().unwrap()).unwrap();

        let mut cursor = TransactionCursor::open(writer.files().clone(), LogPosition::start_of(0)).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap().tx_id, 2);
        assert!(cursor.next().is_none());
        assert_eq!(cursor.discarded_transactions(), 1);
        assert_eq!(cursor.last_committed_end(), committed.end_position);
    }

    #[test]
    fn test_missing_middle_segment() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(&temp_dir);
        writer.append_transaction(&node(0)).unwrap();
        writer.rotate().unwrap();
        writer.rotate().unwrap();
        writer.append_transaction(&node(1)).unwrap();
        std::fs::remove_file(writer.files().path_for(1)).unwrap();

        let results: Vec<_> = TransactionCursor::open(writer.files().clone(), LogPosition::start_of(0))
            .unwrap()
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(LogError::MissingLogVersion { version: 1, .. })));
    }

    #[test]
    fn test_single_segment_stops_at_segment_end() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(&temp_dir);
        writer.append_transaction(&node(0)).unwrap();
        writer.rotate().unwrap();
        writer.append_transaction(&node(1)).unwrap();

        let cursor = TransactionCursor::single_segment(writer.files().clone(), LogPosition::start_of(0)).unwrap();
        assert_eq!(cursor.count(), 1);
    }

    #[test]
    fn test_empty_log() {
        let temp_dir = TempDir::new().unwrap();
        let files = LogFiles::new(temp_dir.path(), "log");
        let mut cursor = TransactionCursor::open(files, LogPosition::start_of(0)).unwrap();
        assert!(cursor.next().is_none());
        assert_eq!(cursor.last_committed_end(), LogPosition::start_of(0));
    }
}
