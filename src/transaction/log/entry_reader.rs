// BayunGraph Log Entry Reader
//
// Sequential reader over the entries of one log segment.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::common::types::LogVersion;
use super::error::{LogError, Result};
use super::log_entry::{LogEntry, ENTRY_HEADER_SIZE, MAX_ENTRY_SIZE};
use super::log_file_header::LogFileHeader;
use super::log_position::LogPosition;

/// An entry together with where it starts and where the next one starts
#[derive(Debug, Clone)]
pub struct PositionedEntry {
    pub entry: LogEntry,
    pub position: LogPosition,
    pub next_position: LogPosition,
}

/// Reader over the entries of a single segment
pub struct LogEntryReader {
    reader: BufReader<File>,
    path: PathBuf,
    header: LogFileHeader,
    position: u64,
    file_size: u64,
}

impl LogEntryReader {
    /// Open a segment and validate its header against the expected version
    pub fn open(path: &Path, version: LogVersion) -> Result<Self> {
        if !path.exists() {
            return Err(LogError::MissingLogVersion {
                version,
                path: path.to_path_buf(),
            });
        }
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < LogFileHeader::HEADER_SIZE as u64 {
            return Err(LogError::InvalidHeader(path.to_path_buf()));
        }

        let header = LogFileHeader::read_from(&mut file)?;
        if !header.validate() || header.log_version != version {
            return Err(LogError::InvalidHeader(path.to_path_buf()));
        }

        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            header,
            position: LogFileHeader::HEADER_SIZE as u64,
            file_size,
        })
    }

    pub fn header(&self) -> &LogFileHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> LogVersion {
        self.header.log_version
    }

    pub fn position(&self) -> LogPosition {
        LogPosition::new(self.header.log_version, self.position)
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Move to a byte offset, which must lie on an entry boundary
    pub fn seek(&mut self, byte_offset: u64) -> Result<()> {
        if byte_offset < LogFileHeader::HEADER_SIZE as u64 || byte_offset > self.file_size {
            return Err(LogError::InvalidState(format!(
                "Offset {} is outside of {:?} ({} bytes)",
                byte_offset, self.path, self.file_size
            )));
        }
        self.reader.seek(SeekFrom::Start(byte_offset))?;
        self.position = byte_offset;
        Ok(())
    }

    /// Read the next entry. `None` marks the end of the segment's entries,
    /// including an entry torn by a crash.
    pub fn next_entry(&mut self) -> Result<Option<PositionedEntry>> {
        let position = self.position();
        let remaining = self.file_size - self.position;
        if remaining < ENTRY_HEADER_SIZE as u64 {
            if remaining > 0 {
                debug!("Ignoring {} trailing bytes at {}", remaining, position);
            }
            return Ok(None);
        }

        let mut frame_header = [0u8; ENTRY_HEADER_SIZE];
        self.reader.read_exact(&mut frame_header)?;
        let length = LittleEndian::read_u32(&frame_header[0..4]) as usize;
        let checksum = LittleEndian::read_u32(&frame_header[4..8]);

        if length == 0 {
            // Zero-filled space past the last entry
            return Ok(None);
        }
        if length > MAX_ENTRY_SIZE {
            return Err(LogError::Corrupt {
                position,
                reason: format!("entry length {} exceeds the maximum of {}", length, MAX_ENTRY_SIZE),
            });
        }

        let frame_end = self.position + (ENTRY_HEADER_SIZE + length) as u64;
        if frame_end > self.file_size {
            warn!("Entry at {} is cut short by the end of {:?}", position, self.path);
            return Ok(None);
        }

        let mut payload = vec![0u8; length];
        self.reader.read_exact(&mut payload)?;

        match LogEntry::decode(&payload, checksum) {
            Ok(entry) => {
                self.position = frame_end;
                Ok(Some(PositionedEntry {
                    entry,
                    position,
                    next_position: self.position(),
                }))
            }
            Err(reason) if frame_end == self.file_size => {
                warn!("Treating unreadable final entry at {} as a torn write: {}", position, reason);
                Ok(None)
            }
            Err(reason) => Err(LogError::Corrupt { position, reason }),
        }
    }
}
