// BayunGraph Id Generator
//
// Tracks the high id and the free ids of one record store. The on-disk
// file carries a clean flag: opening a generator clears it and only a
// clean close sets it again, so a generator left open by a crash is dirty
// on the next start. Every write replaces the whole file through a
// temporary sibling, so a crash leaves either the old or the new state.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::common::types::RecordId;
use crate::storage::layout::StoreType;
use super::error::{IdError, Result};

const MAGIC: u32 = 0x4944_4746; // "IDGF"
const HEADER_SIZE: usize = 17;
const CLEAN: u8 = 1;
const DIRTY: u8 = 0;

/// What a read-only look at an id file found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFileState {
    Missing,
    /// Present but unreadable, e.g. torn by a crash. Regenerated like a
    /// missing file.
    Corrupt,
    Clean,
    Dirty,
}

struct IdFileHeader {
    clean: bool,
    high_id: u64,
    free_count: u32,
}

impl IdFileHeader {
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], MAGIC);
        bytes[4] = if self.clean { CLEAN } else { DIRTY };
        LittleEndian::write_u64(&mut bytes[5..13], self.high_id);
        LittleEndian::write_u32(&mut bytes[13..17], self.free_count);
        bytes
    }

    fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        if bytes.len() < HEADER_SIZE || LittleEndian::read_u32(&bytes[0..4]) != MAGIC {
            return Err(IdError::InvalidHeader(path.to_path_buf()));
        }
        let header = Self {
            clean: bytes[4] == CLEAN,
            high_id: LittleEndian::read_u64(&bytes[5..13]),
            free_count: LittleEndian::read_u32(&bytes[13..17]),
        };
        if bytes.len() != HEADER_SIZE + header.free_count as usize * 8 {
            return Err(IdError::InvalidHeader(path.to_path_buf()));
        }
        Ok(header)
    }
}

fn read_id_file(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Id allocation state of one store
pub struct IdGenerator {
    path: PathBuf,
    store_type: StoreType,
    high_id: u64,
    free_ids: BTreeSet<RecordId>,
    dirty_on_startup: bool,
}

impl IdGenerator {
    /// Write a fresh, clean id file
    pub fn create(
        path: &Path,
        high_id: u64,
        free_ids: impl IntoIterator<Item = RecordId>,
    ) -> Result<()> {
        let free_ids: BTreeSet<RecordId> = free_ids.into_iter().filter(|id| *id < high_id).collect();
        Self::write_state(path, true, high_id, &free_ids)
    }

    /// Look at an id file without opening it for writing
    pub fn probe(path: &Path) -> Result<IdFileState> {
        if !path.exists() {
            return Ok(IdFileState::Missing);
        }
        match IdFileHeader::parse(&read_id_file(path)?, path) {
            Ok(header) if header.clean => Ok(IdFileState::Clean),
            Ok(_) => Ok(IdFileState::Dirty),
            Err(IdError::InvalidHeader(_)) => {
                warn!("Id file {:?} is unreadable", path);
                Ok(IdFileState::Corrupt)
            }
            Err(e) => Err(e),
        }
    }

    /// Open an id file and mark it dirty on disk until `close`
    pub fn open(path: &Path, store_type: StoreType) -> Result<Self> {
        if !path.exists() {
            return Err(IdError::Missing(path.to_path_buf()));
        }
        let bytes = read_id_file(path)?;
        let header = IdFileHeader::parse(&bytes, path)?;
        let free_ids: BTreeSet<RecordId> = bytes[HEADER_SIZE..]
            .chunks_exact(8)
            .map(LittleEndian::read_u64)
            .collect();

        // Write marker: dirty until a clean close
        Self::write_state(path, false, header.high_id, &free_ids)?;

        debug!(
            "Opened {} id generator: high id {}, {} free ids, dirty on startup: {}",
            store_type, header.high_id, free_ids.len(), !header.clean
        );

        Ok(Self {
            path: path.to_path_buf(),
            store_type,
            high_id: header.high_id,
            free_ids,
            dirty_on_startup: !header.clean,
        })
    }

    fn write_state(path: &Path, clean: bool, high_id: u64, free_ids: &BTreeSet<RecordId>) -> Result<()> {
        let header = IdFileHeader {
            clean,
            high_id,
            free_count: free_ids.len() as u32,
        };
        let mut bytes = Vec::with_capacity(HEADER_SIZE + free_ids.len() * 8);
        bytes.extend_from_slice(&header.to_bytes());
        let mut id_bytes = [0u8; 8];
        for id in free_ids {
            LittleEndian::write_u64(&mut id_bytes, *id);
            bytes.extend_from_slice(&id_bytes);
        }

        let temp = temp_path(path);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&temp, path)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }

    /// Whether the file was left dirty by an unclean shutdown
    pub fn dirty_on_startup(&self) -> bool {
        self.dirty_on_startup
    }

    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    pub fn high_id(&self) -> u64 {
        self.high_id
    }

    pub fn free_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.free_ids.iter()
    }

    /// Allocate an id, reusing the lowest free id first
    pub fn next_id(&mut self) -> RecordId {
        if let Some(id) = self.free_ids.pop_first() {
            return id;
        }
        let id = self.high_id;
        self.high_id += 1;
        id
    }

    /// Mark an id as used. Ids skipped over by raising the high id become free.
    pub fn mark_used(&mut self, id: RecordId) {
        if id >= self.high_id {
            self.free_ids.extend(self.high_id..id);
            self.high_id = id + 1;
        }
        self.free_ids.remove(&id);
    }

    /// Release an id for reuse
    pub fn mark_free(&mut self, id: RecordId) {
        if id < self.high_id {
            self.free_ids.insert(id);
        }
    }

    /// Batch id updates for one transaction
    pub fn marker(&mut self) -> IdMarker<'_> {
        IdMarker {
            generator: self,
            used: Vec::new(),
            freed: Vec::new(),
        }
    }

    /// Recompute the free list from the store's in-use records
    pub fn rebuild(&mut self, high_id: u64, in_use_ids: &[RecordId]) {
        let in_use: BTreeSet<RecordId> = in_use_ids.iter().copied().collect();
        self.high_id = high_id;
        self.free_ids = (0..high_id).filter(|id| !in_use.contains(id)).collect();
        debug!(
            "Rebuilt {} id generator: high id {}, {} free ids",
            self.store_type, self.high_id, self.free_ids.len()
        );
    }

    /// Persist the current state without marking the file clean
    pub fn checkpoint(&mut self) -> Result<()> {
        Self::write_state(&self.path, false, self.high_id, &self.free_ids)
    }

    /// Persist the current state and mark the file clean
    pub fn close(self) -> Result<()> {
        Self::write_state(&self.path, true, self.high_id, &self.free_ids)?;
        debug!("Closed {} id generator at {:?}", self.store_type, self.path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Pending id updates, applied to the generator when dropped
pub struct IdMarker<'a> {
    generator: &'a mut IdGenerator,
    used: Vec<RecordId>,
    freed: Vec<RecordId>,
}

impl IdMarker<'_> {
    pub fn mark_used(&mut self, id: RecordId) {
        self.used.push(id);
    }

    pub fn mark_deleted(&mut self, id: RecordId) {
        self.freed.push(id);
    }
}

impl Drop for IdMarker<'_> {
    fn drop(&mut self) {
        for id in self.used.drain(..) {
            self.generator.mark_used(id);
        }
        for id in self.freed.drain(..) {
            self.generator.mark_free(id);
        }
    }
}
