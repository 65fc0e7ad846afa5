// BayunGraph Transaction Module
//
// Durable transaction state: the write-ahead log and the checkpoint log.

pub mod log;
pub mod checkpoint;

// Public exports
pub use self::log::{CommittedTransaction, LogPosition, TransactionCursor, TransactionLogWriter};
pub use self::checkpoint::{CheckpointFile, CheckpointInfo};
