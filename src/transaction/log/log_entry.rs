// BayunGraph Log Entries
//
// Entries are framed as `[length: u32][crc32: u32][bincode payload]`.
// One transaction is always `Start`, one or more `Command`s, then `Commit`.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Serialize, Deserialize};
use bincode::{serialize, deserialize};

use crate::common::types::{current_time_millis, RecordId, TxId};
use crate::storage::layout::StoreType;
use crate::storage::record::{NodeRecord, PropertyRecord, Record, RelationshipRecord, SchemaRecord};
use super::error::{LogError, Result};
use super::log_position::LogPosition;

/// Size of the length and checksum prefix of every entry
pub const ENTRY_HEADER_SIZE: usize = 8;

/// Entries larger than this are treated as corrupt
pub const MAX_ENTRY_SIZE: usize = 16 * 1024 * 1024;

/// A low-level mutation carrying the after-image of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Node(NodeRecord),
    Relationship(RelationshipRecord),
    Property(PropertyRecord),
    Schema(SchemaRecord),
}

impl Command {
    pub fn store_type(&self) -> StoreType {
        match self {
            Command::Node(_) => StoreType::Node,
            Command::Relationship(_) => StoreType::Relationship,
            Command::Property(_) => StoreType::Property,
            Command::Schema(_) => StoreType::Schema,
        }
    }

    pub fn record_id(&self) -> RecordId {
        match self {
            Command::Node(r) => r.id(),
            Command::Relationship(r) => r.id(),
            Command::Property(r) => r.id(),
            Command::Schema(r) => r.id(),
        }
    }

    /// Whether the after-image is an in-use record (create/update) or a deletion
    pub fn in_use(&self) -> bool {
        match self {
            Command::Node(r) => r.in_use(),
            Command::Relationship(r) => r.in_use(),
            Command::Property(r) => r.in_use(),
            Command::Schema(r) => r.in_use(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEntry {
    pub time_written: u64,
    pub last_committed_tx_when_started: TxId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub tx_id: TxId,
    pub time_written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Transaction log position from which recovery would replay
    pub log_position: LogPosition,
    pub timestamp: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEntry {
    Start(StartEntry),
    Command(Command),
    Commit(CommitEntry),
    CheckPoint(CheckpointEntry),
}

impl LogEntry {
    pub fn start(last_committed_tx_when_started: TxId) -> Self {
        LogEntry::Start(StartEntry {
            time_written: current_time_millis(),
            last_committed_tx_when_started,
        })
    }

    pub fn commit(tx_id: TxId) -> Self {
        LogEntry::Commit(CommitEntry {
            tx_id,
            time_written: current_time_millis(),
        })
    }

    pub fn checkpoint(log_position: LogPosition, reason: impl Into<String>) -> Self {
        LogEntry::CheckPoint(CheckpointEntry {
            log_position,
            timestamp: current_time_millis(),
            reason: reason.into(),
        })
    }

    /// Serialize into a framed entry
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = serialize(self).map_err(|e| LogError::SerializationError(e.to_string()))?;
        let mut bytes = vec![0u8; ENTRY_HEADER_SIZE + payload.len()];
        LittleEndian::write_u32(&mut bytes[0..4], payload.len() as u32);
        LittleEndian::write_u32(&mut bytes[4..8], crc32fast::hash(&payload));
        bytes[ENTRY_HEADER_SIZE..].copy_from_slice(&payload);
        Ok(bytes)
    }

    /// Check the payload against its checksum and deserialize it
    pub fn decode(payload: &[u8], checksum: u32) -> std::result::Result<Self, String> {
        let actual = crc32fast::hash(payload);
        if actual != checksum {
            return Err(format!("checksum mismatch: expected {:#010x}, found {:#010x}", checksum, actual));
        }
        deserialize(payload).map_err(|e| e.to_string())
    }
}
