// BayunGraph Log File Set
//
// Enumerates and manages the segments `<base>.<version>` of one segmented
// log in a directory. Used for both the transaction log and the checkpoint
// log.
//
// A highest segment whose header never fully reached the disk was being
// created when the process died. It holds nothing and is left out of the
// segment set until the next segment creation replaces it.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use log::{debug, info, warn};

use crate::common::types::{LogVersion, TxId};
use super::entry_reader::LogEntryReader;
use super::error::{LogError, Result};
use super::log_file_header::LogFileHeader;
use super::log_file_utils::{find_log_files, log_file_name};
use super::log_position::LogPosition;

/// The segments of one log
#[derive(Debug, Clone)]
pub struct LogFiles {
    dir: PathBuf,
    base_name: String,
}

impl LogFiles {
    pub fn new(dir: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Path of the segment with the given version, whether or not it exists
    pub fn path_for(&self, version: LogVersion) -> PathBuf {
        self.dir.join(log_file_name(&self.base_name, version))
    }

    /// Versions of all existing segments, ascending. A highest segment
    /// with a torn header is not included.
    pub fn versions(&self) -> Result<Vec<LogVersion>> {
        let mut versions: Vec<LogVersion> = find_log_files(&self.dir, &self.base_name)?
            .into_iter()
            .map(|(version, _)| version)
            .collect();
        if let Some(&highest) = versions.last() {
            if self.has_torn_header(highest)? {
                debug!("Ignoring log segment {:?} with a torn header", self.path_for(highest));
                versions.pop();
            }
        }
        Ok(versions)
    }

    /// Whether a segment is shorter than its header or its header is all
    /// zeroes
    pub fn has_torn_header(&self, version: LogVersion) -> Result<bool> {
        let path = self.path_for(version);
        if !path.is_file() {
            return Ok(false);
        }
        let mut bytes = Vec::with_capacity(LogFileHeader::HEADER_SIZE);
        File::open(&path)?
            .take(LogFileHeader::HEADER_SIZE as u64)
            .read_to_end(&mut bytes)?;
        Ok(bytes.len() < LogFileHeader::HEADER_SIZE || bytes.iter().all(|b| *b == 0))
    }

    /// Remove the highest segment if its header is torn. Returns its version.
    pub fn discard_torn_segment(&self) -> Result<Option<LogVersion>> {
        let Some((version, path)) = find_log_files(&self.dir, &self.base_name)?.pop() else {
            return Ok(None);
        };
        if !self.has_torn_header(version)? {
            return Ok(None);
        }
        warn!("Removing log segment {:?}, its header was torn by a crash", path);
        fs::remove_file(&path)?;
        Ok(Some(version))
    }

    pub fn highest_version(&self) -> Result<Option<LogVersion>> {
        Ok(self.versions()?.last().copied())
    }

    pub fn lowest_version(&self) -> Result<Option<LogVersion>> {
        Ok(self.versions()?.first().copied())
    }

    pub fn version_exists(&self, version: LogVersion) -> bool {
        self.path_for(version).is_file()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.versions()?.is_empty())
    }

    /// Versions in `from..=to` that have no segment
    pub fn missing_versions(&self, from: LogVersion, to: LogVersion) -> Vec<LogVersion> {
        (from..=to).filter(|v| !self.version_exists(*v)).collect()
    }

    /// Read just the header of a segment
    pub fn extract_header(&self, version: LogVersion) -> Result<LogFileHeader> {
        let path = self.path_for(version);
        if !path.exists() {
            return Err(LogError::MissingLogVersion { version, path });
        }
        let mut file = File::open(&path)?;
        if file.metadata()?.len() < LogFileHeader::HEADER_SIZE as u64 {
            return Err(LogError::InvalidHeader(path));
        }
        let header = LogFileHeader::read_from(&mut file)?;
        if !header.validate() || header.log_version != version {
            return Err(LogError::InvalidHeader(path));
        }
        Ok(header)
    }

    pub fn file_size(&self, version: LogVersion) -> Result<u64> {
        Ok(fs::metadata(self.path_for(version))?.len())
    }

    /// Open a segment for sequential reading
    pub fn open_reader(&self, version: LogVersion) -> Result<LogEntryReader> {
        LogEntryReader::open(&self.path_for(version), version)
    }

    /// Create a new, empty segment, replacing a torn highest segment. Fails
    /// if the segment already exists otherwise.
    pub fn create_segment(
        &self,
        version: LogVersion,
        last_committed_tx_id: TxId,
        store_id: u64,
    ) -> Result<File> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(version);
        self.discard_torn_segment()?;
        if path.is_file() {
            return Err(LogError::InvalidState(format!("Log segment {:?} already exists", path)));
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        LogFileHeader::new(version, last_committed_tx_id, store_id).write_to(&mut file)?;
        file.sync_all()?;
        info!("Created log segment {:?}", path);
        Ok(file)
    }

    /// Open an existing segment with the write cursor at its end
    pub fn open_for_append(&self, version: LogVersion) -> Result<File> {
        self.extract_header(version)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.path_for(version))?;
        file.seek(SeekFrom::End(0))?;
        Ok(file)
    }

    /// Cut a segment at `position`, dropping everything after it
    pub fn truncate(&self, position: LogPosition) -> Result<()> {
        let path = self.path_for(position.log_version);
        let size = self.file_size(position.log_version)?;
        if position.byte_offset < LogFileHeader::HEADER_SIZE as u64 || position.byte_offset > size {
            return Err(LogError::InvalidState(format!(
                "Cannot truncate {:?} ({} bytes) at {}",
                path, size, position
            )));
        }
        if position.byte_offset == size {
            return Ok(());
        }
        let file = OpenOptions::new().write(true).open(&path)?;
        file.set_len(position.byte_offset)?;
        file.sync_all()?;
        info!("Truncated {} bytes from {:?} at {}", size - position.byte_offset, path, position);
        Ok(())
    }

    /// Remove every segment
    pub fn delete_all(&self) -> Result<()> {
        for (version, path) in find_log_files(&self.dir, &self.base_name)? {
            debug!("Deleting log segment {} at {:?}", version, path);
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
