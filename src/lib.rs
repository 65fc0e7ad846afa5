// BayunGraph Database Engine

pub mod common;
pub mod storage;
pub mod transaction;
pub mod recovery;
pub mod database;

// Re-export key items for convenient access
pub use common::config::{CheckpointConfig, DatabaseConfig, TransactionLogConfig};
pub use storage::{DatabaseLayout, StoreType, Tracers};
pub use transaction::{CheckpointFile, CheckpointInfo, LogPosition};
pub use recovery::{
    is_recovery_required, perform_recovery, AvailabilityGuard, Monitors, RecoveryError, RecoveryMonitor,
};
pub use database::{DatabaseError, DatabaseState, GraphDatabase, GraphDatabaseBuilder, Transaction, TransactionError};
