use std::time::{SystemTime, UNIX_EPOCH};

/// Page size in bytes (8KB)
pub const PAGE_SIZE: usize = 8192;

/// Page number within a paged file, starting at zero
pub type PageId = u64;

/// Transaction ID type
pub type TxId = u64;

/// Version number of a log segment
pub type LogVersion = u64;

/// Record ID type
pub type RecordId = u64;

/// Transaction id of a freshly created store. The first committed
/// transaction gets `BASE_TX_ID + 1`.
pub const BASE_TX_ID: TxId = 1;

/// First version of any segmented log
pub const INITIAL_LOG_VERSION: LogVersion = 0;

/// Marker for "no next record" in record chains
pub const NO_NEXT_RECORD: i64 = -1;

/// Milliseconds since the unix epoch
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A page of a paged file
#[derive(Debug, Clone)]
pub struct Page {
    pub data: Vec<u8>,
    pub page_id: PageId,
    pub is_dirty: bool,
}

impl Page {
    pub fn new(page_id: PageId, page_size: usize) -> Self {
        Self {
            data: vec![0; page_size],
            page_id,
            is_dirty: false,
        }
    }
}
