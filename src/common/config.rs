// BayunGraph Configuration
//
// Plain configuration structs for the transaction log, the checkpoint log
// and the database as a whole.

/// Configuration for the segmented transaction log
#[derive(Debug, Clone)]
pub struct TransactionLogConfig {
    /// Base name for log segment files (`<base>.<version>`)
    pub log_file_base_name: String,

    /// Size after which the log rotates to a new segment. Rotation only
    /// happens on a transaction boundary.
    pub rotation_threshold: u64,

    /// Whether to fsync the segment after every commit
    pub force_sync: bool,
}

impl Default for TransactionLogConfig {
    fn default() -> Self {
        Self {
            log_file_base_name: "neostore.transaction.db".to_string(),
            rotation_threshold: 250 * 1024 * 1024, // 250 MB
            force_sync: true,
        }
    }
}

/// Configuration for the checkpoint log
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Base name for checkpoint segment files
    pub checkpoint_file_base_name: String,

    /// Size after which the checkpoint log rotates
    pub rotation_threshold: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_file_base_name: "checkpoint".to_string(),
            rotation_threshold: 1024 * 1024, // 1 MB
        }
    }
}

/// Configuration for a database instance
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Transaction log settings
    pub transaction_log: TransactionLogConfig,

    /// Checkpoint log settings
    pub checkpoint: CheckpointConfig,

    /// Refuse to recover when transaction logs required for recovery are
    /// missing. When disabled, recovery starts from whatever is left.
    pub fail_on_missing_files: bool,

    /// Number of pages the page cache keeps resident
    pub page_cache_pages: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            transaction_log: TransactionLogConfig::default(),
            checkpoint: CheckpointConfig::default(),
            fail_on_missing_files: true,
            page_cache_pages: 1024,
        }
    }
}

impl DatabaseConfig {
    /// Configuration that tolerates missing transaction logs
    pub fn force_recovery() -> Self {
        Self {
            fail_on_missing_files: false,
            ..Self::default()
        }
    }
}
