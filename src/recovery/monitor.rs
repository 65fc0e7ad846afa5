// BayunGraph Recovery Monitors
//
// Event hooks fired by recovery. Monitors are passed in explicitly; a
// panicking monitor is logged and otherwise ignored.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use log::{info, warn};

use crate::common::types::TxId;
use crate::storage::layout::StoreType;
use crate::transaction::log::LogPosition;

/// Recovery event sink. Every event has an empty default.
pub trait RecoveryMonitor: Send + Sync {
    /// Recovery will replay from `start`
    fn recovery_required(&self, _start: LogPosition) {}

    /// The reverse scan finished; `lowest_recovered_tx_id` is the oldest
    /// transaction it saw
    fn reverse_store_recovery_completed(&self, _lowest_recovered_tx_id: TxId) {}

    fn transaction_recovered(&self, _tx_id: TxId) {}

    fn id_generator_rebuilt(&self, _store_type: StoreType) {}

    /// Nothing was committed after the last checkpoint at `position`
    fn no_commits_after_last_checkpoint(&self, _position: LogPosition) {}

    fn recovery_completed(&self, _transaction_count: usize, _elapsed_millis: u64) {}

    fn failed_to_recover(&self, _message: &str) {}
}

/// The monitors of one database
#[derive(Clone, Default)]
pub struct Monitors {
    monitors: Vec<Arc<dyn RecoveryMonitor>>,
}

impl Monitors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, monitor: Arc<dyn RecoveryMonitor>) {
        self.monitors.push(monitor);
    }

    pub fn with(mut self, monitor: Arc<dyn RecoveryMonitor>) -> Self {
        self.add(monitor);
        self
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    fn notify(&self, event: &str, f: impl Fn(&dyn RecoveryMonitor)) {
        for monitor in &self.monitors {
            if panic::catch_unwind(AssertUnwindSafe(|| f(monitor.as_ref()))).is_err() {
                warn!("Recovery monitor panicked while handling {}", event);
            }
        }
    }
}

impl RecoveryMonitor for Monitors {
    fn recovery_required(&self, start: LogPosition) {
        self.notify("recovery_required", |m| m.recovery_required(start));
    }

    fn reverse_store_recovery_completed(&self, lowest_recovered_tx_id: TxId) {
        self.notify("reverse_store_recovery_completed", |m| {
            m.reverse_store_recovery_completed(lowest_recovered_tx_id)
        });
    }

    fn transaction_recovered(&self, tx_id: TxId) {
        self.notify("transaction_recovered", |m| m.transaction_recovered(tx_id));
    }

    fn id_generator_rebuilt(&self, store_type: StoreType) {
        self.notify("id_generator_rebuilt", |m| m.id_generator_rebuilt(store_type));
    }

    fn no_commits_after_last_checkpoint(&self, position: LogPosition) {
        self.notify("no_commits_after_last_checkpoint", |m| {
            m.no_commits_after_last_checkpoint(position)
        });
    }

    fn recovery_completed(&self, transaction_count: usize, elapsed_millis: u64) {
        self.notify("recovery_completed", |m| {
            m.recovery_completed(transaction_count, elapsed_millis)
        });
    }

    fn failed_to_recover(&self, message: &str) {
        self.notify("failed_to_recover", |m| m.failed_to_recover(message));
    }
}

/// Monitor that writes recovery progress to the log
#[derive(Debug, Default)]
pub struct LoggingRecoveryMonitor;

impl RecoveryMonitor for LoggingRecoveryMonitor {
    fn recovery_required(&self, start: LogPosition) {
        info!("Recovery required from position {}", start);
    }

    fn reverse_store_recovery_completed(&self, lowest_recovered_tx_id: TxId) {
        info!("Reverse recovery completed, lowest recovered transaction {}", lowest_recovered_tx_id);
    }

    fn id_generator_rebuilt(&self, store_type: StoreType) {
        info!("Rebuilt {} id generator", store_type);
    }

    fn no_commits_after_last_checkpoint(&self, position: LogPosition) {
        info!("No commits found after last checkpoint (last checkpoint at {})", position);
    }

    fn recovery_completed(&self, transaction_count: usize, elapsed_millis: u64) {
        info!("Recovery completed. {} transactions, {} ms", transaction_count, elapsed_millis);
    }

    fn failed_to_recover(&self, message: &str) {
        info!("Recovery failed: {}", message);
    }
}
