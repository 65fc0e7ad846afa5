use std::fmt;
use serde::{Serialize, Deserialize};

use crate::common::types::LogVersion;
use super::log_file_header::LogFileHeader;

/// An exact byte location in the version-segmented log.
/// Ordered by version, then by byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub log_version: LogVersion,
    pub byte_offset: u64,
}

impl LogPosition {
    pub fn new(log_version: LogVersion, byte_offset: u64) -> Self {
        Self { log_version, byte_offset }
    }

    /// First entry position of a segment, right after its header
    pub fn start_of(log_version: LogVersion) -> Self {
        Self::new(log_version, LogFileHeader::HEADER_SIZE as u64)
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogPosition{{logVersion={}, byteOffset={}}}", self.log_version, self.byte_offset)
    }
}
