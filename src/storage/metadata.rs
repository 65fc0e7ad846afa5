// BayunGraph Metadata Store
//
// A small file of fixed-offset slots, each `[in_use: u8][value: i64]`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::common::types::{current_time_millis, BASE_TX_ID, INITIAL_LOG_VERSION};

const SLOT_SIZE: u64 = 9;
const SLOT_IN_USE: u8 = 1;

/// Error type for metadata store operations
#[derive(Error, Debug)]
pub enum MetaDataError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Metadata store {0} does not exist")]
    Missing(PathBuf),
}

/// Result type for metadata store operations
pub type Result<T> = std::result::Result<T, MetaDataError>;

/// Slots of the metadata store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaDataPosition {
    TimeCreated,
    StoreId,
    LastCommittedTransaction,
    LogVersion,
    /// Version of the checkpoint log segment currently written to
    CheckpointLogVersion,
    /// When recovery last regenerated missing id files
    LastMissingStoreFilesRecoveryTimestamp,
}

impl MetaDataPosition {
    pub const ALL: [MetaDataPosition; 6] = [
        MetaDataPosition::TimeCreated,
        MetaDataPosition::StoreId,
        MetaDataPosition::LastCommittedTransaction,
        MetaDataPosition::LogVersion,
        MetaDataPosition::CheckpointLogVersion,
        MetaDataPosition::LastMissingStoreFilesRecoveryTimestamp,
    ];

    fn slot(&self) -> u64 {
        match self {
            MetaDataPosition::TimeCreated => 0,
            MetaDataPosition::StoreId => 1,
            MetaDataPosition::LastCommittedTransaction => 2,
            MetaDataPosition::LogVersion => 3,
            MetaDataPosition::CheckpointLogVersion => 4,
            MetaDataPosition::LastMissingStoreFilesRecoveryTimestamp => 5,
        }
    }

    fn offset(&self) -> u64 {
        self.slot() * SLOT_SIZE
    }
}

/// Access to the metadata store file
pub struct MetaDataStore;

impl MetaDataStore {
    /// Create a metadata store for a new database
    pub fn create(path: &Path, store_id: u64) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let values = [
            (MetaDataPosition::TimeCreated, current_time_millis() as i64),
            (MetaDataPosition::StoreId, store_id as i64),
            (MetaDataPosition::LastCommittedTransaction, BASE_TX_ID as i64),
            (MetaDataPosition::LogVersion, INITIAL_LOG_VERSION as i64),
            (MetaDataPosition::CheckpointLogVersion, INITIAL_LOG_VERSION as i64),
        ];
        for (position, value) in values {
            Self::write_slot(&mut file, position, value)?;
        }
        file.sync_data()?;
        Ok(())
    }

    /// Read one slot. `None` if the slot was never written.
    pub fn get_record(path: &Path, position: MetaDataPosition) -> Result<Option<i64>> {
        if !path.exists() {
            return Err(MetaDataError::Missing(path.to_path_buf()));
        }
        let mut file = File::open(path)?;
        if file.metadata()?.len() < position.offset() + SLOT_SIZE {
            return Ok(None);
        }

        let mut bytes = [0u8; SLOT_SIZE as usize];
        file.seek(SeekFrom::Start(position.offset()))?;
        file.read_exact(&mut bytes)?;
        if bytes[0] != SLOT_IN_USE {
            return Ok(None);
        }
        Ok(Some(LittleEndian::read_i64(&bytes[1..9])))
    }

    /// Write one slot in place
    pub fn set_record(path: &Path, position: MetaDataPosition, value: i64) -> Result<()> {
        if !path.exists() {
            return Err(MetaDataError::Missing(path.to_path_buf()));
        }
        let mut file = OpenOptions::new().write(true).open(path)?;
        Self::write_slot(&mut file, position, value)?;
        file.sync_data()?;
        Ok(())
    }

    fn write_slot(file: &mut File, position: MetaDataPosition, value: i64) -> Result<()> {
        let mut bytes = [0u8; SLOT_SIZE as usize];
        bytes[0] = SLOT_IN_USE;
        LittleEndian::write_i64(&mut bytes[1..9], value);
        file.seek(SeekFrom::Start(position.offset()))?;
        file.write_all(&bytes)?;
        Ok(())
    }
}
