#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use anyhow::Result;
use parking_lot::Mutex;
use tempfile::TempDir;

use bayungraph::common::types::TxId;
use bayungraph::recovery::RecoveryMonitor;
use bayungraph::transaction::log::LogFiles;
use bayungraph::{
    AvailabilityGuard, CheckpointFile, CheckpointInfo, DatabaseConfig, DatabaseLayout, GraphDatabase, LogPosition,
};

// Create a layout in a fresh temporary directory
pub fn temp_layout() -> Result<(DatabaseLayout, TempDir)> {
    let temp_dir = TempDir::new()?;
    Ok((DatabaseLayout::new(temp_dir.path()), temp_dir))
}

// Commit one transaction creating `count` nodes and return its id
pub fn create_nodes(db: &GraphDatabase, count: usize) -> Result<TxId> {
    let mut tx = db.begin_transaction()?;
    for _ in 0..count {
        tx.create_node(1)?;
    }
    Ok(tx.commit()?)
}

// Commit `count` single-node transactions
pub fn commit_transactions(db: &GraphDatabase, count: usize) -> Result<TxId> {
    let mut last = 0;
    for _ in 0..count {
        last = create_nodes(db, 1)?;
    }
    Ok(last)
}

// Transaction log files of a layout
pub fn transaction_logs(layout: &DatabaseLayout, config: &DatabaseConfig) -> LogFiles {
    let (dir, base_name) = layout.transaction_log_base(config);
    LogFiles::new(dir, base_name)
}

// Checkpoint log files of a layout
pub fn checkpoint_logs(layout: &DatabaseLayout, config: &DatabaseConfig) -> LogFiles {
    let (dir, base_name) = layout.checkpoint_log_base(config);
    LogFiles::new(dir, base_name)
}

// Every checkpoint record currently readable
pub fn reachable_checkpoints(layout: &DatabaseLayout, config: &DatabaseConfig) -> Result<Vec<CheckpointInfo>> {
    let checkpoints = CheckpointFile::new(checkpoint_logs(layout, config), config.checkpoint.clone(), 0, 0);
    Ok(checkpoints.reachable_checkpoints()?)
}

// Cut the most recent checkpoint record off the checkpoint log
pub fn remove_last_checkpoint(layout: &DatabaseLayout, config: &DatabaseConfig) -> Result<CheckpointInfo> {
    let files = checkpoint_logs(layout, config);
    let checkpoints = CheckpointFile::new(files.clone(), config.checkpoint.clone(), 0, 0);
    let last = checkpoints
        .find_latest_checkpoint()?
        .ok_or_else(|| anyhow::anyhow!("no checkpoint to remove"))?;
    let file = fs::OpenOptions::new()
        .write(true)
        .open(files.path_for(last.checkpoint_log_version()))?;
    file.set_len(last.entry_position.byte_offset)?;
    file.sync_all()?;
    Ok(last)
}

// Contents of every file in the database directory
pub fn snapshot(layout: &DatabaseLayout) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(layout.database_dir())? {
        let path = entry?.path();
        if path.is_file() {
            files.insert(path.clone(), fs::read(&path)?);
        }
    }
    Ok(files)
}

/// Records recovery monitor events
#[derive(Default)]
pub struct RecordingMonitor {
    pub recovery_required: AtomicUsize,
    pub recovered_transactions: Mutex<Vec<TxId>>,
    pub reverse_completed: Mutex<Vec<TxId>>,
    pub no_commits: Mutex<Vec<LogPosition>>,
    pub completed: Mutex<Vec<usize>>,
    pub failures: Mutex<Vec<String>>,
    /// Shut this guard down once the reverse scan completes
    pub shutdown_on_reverse: Mutex<Option<Arc<AvailabilityGuard>>>,
}

impl RecordingMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stopping(guard: Arc<AvailabilityGuard>) -> Arc<Self> {
        let monitor = Self::default();
        *monitor.shutdown_on_reverse.lock() = Some(guard);
        Arc::new(monitor)
    }
}

impl RecoveryMonitor for RecordingMonitor {
    fn recovery_required(&self, _start: LogPosition) {
        self.recovery_required.fetch_add(1, Ordering::SeqCst);
    }

    fn reverse_store_recovery_completed(&self, lowest_recovered_tx_id: TxId) {
        self.reverse_completed.lock().push(lowest_recovered_tx_id);
        if let Some(guard) = self.shutdown_on_reverse.lock().as_ref() {
            guard.shutdown("stopped during reverse recovery");
        }
    }

    fn transaction_recovered(&self, tx_id: TxId) {
        self.recovered_transactions.lock().push(tx_id);
    }

    fn no_commits_after_last_checkpoint(&self, position: LogPosition) {
        self.no_commits.lock().push(position);
    }

    fn recovery_completed(&self, transaction_count: usize, _elapsed_millis: u64) {
        self.completed.lock().push(transaction_count);
    }

    fn failed_to_recover(&self, message: &str) {
        self.failures.lock().push(message.to_string());
    }
}
