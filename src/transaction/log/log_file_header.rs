use std::fs::File;
use std::io::{self, Read, Write, Seek, SeekFrom};
use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{LogVersion, TxId};

/// Fixed-size header at the start of every log segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileHeader {
    pub magic: u32,
    pub format_version: u32,
    pub log_version: LogVersion,
    /// Last committed transaction id of all previous segments
    pub last_committed_tx_id: TxId,
    pub store_id: u64,
}

impl LogFileHeader {
    /// Magic number for log files: "GWAL" in ASCII
    pub const MAGIC: u32 = 0x4757_414C;
    pub const FORMAT_VERSION: u32 = 1;
    pub const HEADER_SIZE: usize = 32;

    pub fn new(log_version: LogVersion, last_committed_tx_id: TxId, store_id: u64) -> Self {
        Self {
            magic: Self::MAGIC,
            format_version: Self::FORMAT_VERSION,
            log_version,
            last_committed_tx_id,
            store_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::HEADER_SIZE] {
        let mut bytes = [0u8; Self::HEADER_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.magic);
        LittleEndian::write_u32(&mut bytes[4..8], self.format_version);
        LittleEndian::write_u64(&mut bytes[8..16], self.log_version);
        LittleEndian::write_u64(&mut bytes[16..24], self.last_committed_tx_id);
        LittleEndian::write_u64(&mut bytes[24..32], self.store_id);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::HEADER_SIZE]) -> Self {
        Self {
            magic: LittleEndian::read_u32(&bytes[0..4]),
            format_version: LittleEndian::read_u32(&bytes[4..8]),
            log_version: LittleEndian::read_u64(&bytes[8..16]),
            last_committed_tx_id: LittleEndian::read_u64(&bytes[16..24]),
            store_id: LittleEndian::read_u64(&bytes[24..32]),
        }
    }

    pub fn write_to(&self, file: &mut File) -> io::Result<()> {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.to_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn read_from(file: &mut File) -> io::Result<Self> {
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = [0u8; Self::HEADER_SIZE];
        file.read_exact(&mut bytes)?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn validate(&self) -> bool {
        self.magic == Self::MAGIC && self.format_version == Self::FORMAT_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_header_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("log.0");
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .unwrap();

        let header = LogFileHeader::new(4, 117, 9);
        header.write_to(&mut file).unwrap();
        assert_eq!(file.metadata().unwrap().len(), LogFileHeader::HEADER_SIZE as u64);

        let read_back = LogFileHeader::read_from(&mut file).unwrap();
        assert_eq!(read_back, header);
        assert!(read_back.validate());
    }

    #[test]
    fn test_bad_magic_fails_validation() {
        let mut bytes = LogFileHeader::new(0, 1, 1).to_bytes();
        bytes[0] ^= 0xFF;
        assert!(!LogFileHeader::from_bytes(&bytes).validate());
    }
}
