// BayunGraph Forward Replay
//
// Applies committed transactions to the stores in commit order. The same
// applier is used by normal commits, so replaying a transaction the store
// already reflects changes nothing.

use std::time::Instant;
use log::{debug, info};

use crate::common::types::TxId;
use crate::storage::id::IdGenerators;
use crate::storage::layout::StoreType;
use crate::storage::neo_stores::{ApplyOutcome, NeoStores};
use crate::transaction::log::{Command, CommittedTransaction, LogFiles, LogPosition, TransactionCursor};
use super::availability::AvailabilityGuard;
use super::error::{RecoveryError, Result};
use super::index_rebuild::IndexRebuildSchedule;
use super::monitor::{Monitors, RecoveryMonitor};

/// Per-transaction apply counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub applied: usize,
    pub already_applied: usize,
}

/// Applies command batches to the stores, id generators and index schedule
pub struct TransactionApplier<'a> {
    stores: &'a NeoStores,
    id_generators: &'a mut IdGenerators,
    index_rebuilds: &'a mut IndexRebuildSchedule,
}

impl<'a> TransactionApplier<'a> {
    pub fn new(
        stores: &'a NeoStores,
        id_generators: &'a mut IdGenerators,
        index_rebuilds: &'a mut IndexRebuildSchedule,
    ) -> Self {
        Self {
            stores,
            id_generators,
            index_rebuilds,
        }
    }

    /// Apply the commands of one transaction in log order
    pub fn apply(&mut self, commands: &[Command]) -> Result<ApplyStats> {
        let mut stats = ApplyStats::default();
        for store_type in StoreType::ALL {
            let generator = self.id_generators.get_mut(store_type)?;
            let mut marker = generator.marker();
            for command in commands.iter().filter(|c| c.store_type() == store_type) {
                if command.in_use() {
                    marker.mark_used(command.record_id());
                } else {
                    marker.mark_deleted(command.record_id());
                }
            }
        }

        for command in commands {
            match self.stores.apply(command)? {
                ApplyOutcome::Applied => stats.applied += 1,
                ApplyOutcome::AlreadyApplied => stats.already_applied += 1,
            }
            if let Command::Schema(record) = command {
                if record.in_use {
                    self.index_rebuilds.mark(record.descriptor());
                } else {
                    self.index_rebuilds.unmark(record.id);
                }
            }
        }
        Ok(stats)
    }
}

/// What forward replay did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub transactions: usize,
    pub last_tx_id: Option<TxId>,
    /// Position right after the last replayed transaction, or the start
    /// position if nothing was replayed
    pub end_position: LogPosition,
    pub discarded_transactions: usize,
    pub already_applied_commands: usize,
}

/// Reads committed transactions forward and applies them
pub struct ForwardReplayEngine<'a> {
    log_files: &'a LogFiles,
    guard: &'a AvailabilityGuard,
    monitors: &'a Monitors,
}

impl<'a> ForwardReplayEngine<'a> {
    pub fn new(log_files: &'a LogFiles, guard: &'a AvailabilityGuard, monitors: &'a Monitors) -> Self {
        Self {
            log_files,
            guard,
            monitors,
        }
    }

    /// Replay every committed transaction after `start`. The guard is
    /// checked before each transaction; a shutdown stops replay between
    /// transactions with `RecoveryError::Aborted`.
    pub fn replay(&self, start: LogPosition, applier: &mut TransactionApplier<'_>) -> Result<ReplayOutcome> {
        let started = Instant::now();
        let mut cursor = TransactionCursor::open(self.log_files.clone(), start).map_err(RecoveryError::LogRead)?;
        let mut outcome = ReplayOutcome {
            transactions: 0,
            last_tx_id: None,
            end_position: start,
            discarded_transactions: 0,
            already_applied_commands: 0,
        };

        loop {
            self.guard.check_not_shutdown()?;
            let tx: CommittedTransaction = match cursor.next() {
                Some(tx) => tx.map_err(RecoveryError::LogRead)?,
                None => break,
            };

            let stats = applier.apply(&tx.commands)?;
            debug!(
                "Replayed transaction {} ({} commands, {} already applied)",
                tx.tx_id,
                tx.commands.len(),
                stats.already_applied
            );
            outcome.transactions += 1;
            outcome.last_tx_id = Some(tx.tx_id);
            outcome.end_position = tx.end_position;
            outcome.already_applied_commands += stats.already_applied;
            self.monitors.transaction_recovered(tx.tx_id);
        }

        outcome.discarded_transactions = cursor.discarded_transactions();
        info!(
            "Replayed {} transactions from {} in {} ms",
            outcome.transactions,
            start,
            started.elapsed().as_millis()
        );
        Ok(outcome)
    }
}
