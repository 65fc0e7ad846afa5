// BayunGraph Checkpoint Module
//
// The checkpoint log: a segmented log of its own that records log positions
// known to be consistent.

pub mod error;
pub mod checkpoint_file;

// Public exports
pub use error::{CheckpointError, Result};
pub use checkpoint_file::{resolve_checkpoint_log_version, CheckpointFile, CheckpointInfo};
