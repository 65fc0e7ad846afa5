// BayunGraph Transaction Log Module
//
// The segmented write-ahead log: file layout, entry framing, appending and
// forward/backward iteration over committed transactions.

pub mod error;
pub mod log_position;
pub mod log_file_header;
pub mod log_file_utils;
pub mod log_entry;
pub mod entry_reader;
pub mod log_files;
pub mod log_writer;
pub mod transaction_cursor;
pub mod reversed_cursor;

// Public exports
pub use error::{LogError, Result};
pub use log_position::LogPosition;
pub use log_file_header::LogFileHeader;
pub use log_entry::{Command, LogEntry};
pub use entry_reader::{LogEntryReader, PositionedEntry};
pub use log_files::LogFiles;
pub use log_writer::{AppendedTransaction, TransactionLogWriter};
pub use transaction_cursor::{CommittedTransaction, TransactionCursor};
pub use reversed_cursor::ReversedTransactionCursor;
