// BayunGraph Recovery Facade
//
// Decides whether a database needs recovery and runs it:
// store files → start position → reverse scan → forward replay →
// id repair → tail truncation → checkpoint → metadata.

use std::sync::Arc;
use std::time::Instant;
use log::{error, info, warn};

use crate::common::config::DatabaseConfig;
use crate::common::types::{LogVersion, TxId, BASE_TX_ID, INITIAL_LOG_VERSION};
use crate::storage::id::{IdFileState, IdGenerators};
use crate::storage::layout::{DatabaseLayout, StoreType};
use crate::storage::metadata::{MetaDataError, MetaDataPosition, MetaDataStore};
use crate::storage::neo_stores::{missing_store_files, NeoStores};
use crate::storage::page_cache::{PageCache, Tracers};
use crate::transaction::checkpoint::{resolve_checkpoint_log_version, CheckpointFile, CheckpointInfo};
use crate::transaction::log::{LogError, LogFiles, LogPosition, ReversedTransactionCursor};
use super::availability::AvailabilityGuard;
use super::error::{RecoveryCheckError, RecoveryError, Result};
use super::id_repair::{rebuild_id_generators, regenerate_missing_id_files};
use super::index_rebuild::{IndexPopulator, IndexRebuildSchedule, RecordingIndexPopulator};
use super::monitor::{Monitors, RecoveryMonitor};
use super::replay::{ForwardReplayEngine, TransactionApplier};
use super::start_locator::{RecoveryStartInformation, RecoveryStartLocator};

/// Reason recorded with the checkpoint written after recovery
pub const RECOVERY_CHECKPOINT_REASON: &str = "Recovery completed.";

/// What a recovery pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// False when there was nothing to recover
    pub recovery_performed: bool,
    pub recovered_transactions: usize,
    pub lowest_recovered_tx_id: Option<TxId>,
    pub last_committed_tx_id: TxId,
    pub rebuilt_id_generators: Vec<StoreType>,
    pub scheduled_index_rebuilds: usize,
    pub checkpoint: Option<CheckpointInfo>,
}

impl RecoveryOutcome {
    fn not_performed(last_committed_tx_id: TxId) -> Self {
        Self {
            recovery_performed: false,
            recovered_transactions: 0,
            lowest_recovered_tx_id: None,
            last_committed_tx_id,
            rebuilt_id_generators: Vec::new(),
            scheduled_index_rebuilds: 0,
            checkpoint: None,
        }
    }
}

/// Whether the database in `layout` needs recovery. Never writes to disk.
pub fn is_recovery_required(
    layout: &DatabaseLayout,
    config: &DatabaseConfig,
) -> std::result::Result<bool, RecoveryCheckError> {
    RecoveryFacade::new(layout.clone(), config.clone()).is_recovery_required()
}

/// Recover the database in `layout`. With `force_recovery` the full pass
/// runs even if nothing needs recovering.
pub fn perform_recovery(
    layout: &DatabaseLayout,
    config: &DatabaseConfig,
    tracers: &Tracers,
    monitors: &Monitors,
    force_recovery: bool,
) -> Result<()> {
    RecoveryFacade::new(layout.clone(), config.clone())
        .with_tracers(tracers.clone())
        .with_monitors(monitors.clone())
        .perform_recovery(force_recovery)
        .map(|_| ())
}

/// Recovery entry point with its collaborators
pub struct RecoveryFacade {
    layout: DatabaseLayout,
    config: DatabaseConfig,
    tracers: Tracers,
    monitors: Monitors,
    guard: Arc<AvailabilityGuard>,
    index_populator: Arc<dyn IndexPopulator>,
}

impl RecoveryFacade {
    pub fn new(layout: DatabaseLayout, config: DatabaseConfig) -> Self {
        Self {
            layout,
            config,
            tracers: Tracers::new(),
            monitors: Monitors::new(),
            guard: Arc::new(AvailabilityGuard::new()),
            index_populator: Arc::new(RecordingIndexPopulator::new()),
        }
    }

    pub fn with_tracers(mut self, tracers: Tracers) -> Self {
        self.tracers = tracers;
        self
    }

    pub fn with_monitors(mut self, monitors: Monitors) -> Self {
        self.monitors = monitors;
        self
    }

    pub fn with_guard(mut self, guard: Arc<AvailabilityGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_index_populator(mut self, index_populator: Arc<dyn IndexPopulator>) -> Self {
        self.index_populator = index_populator;
        self
    }

    fn transaction_log_files(&self) -> LogFiles {
        let (dir, base_name) = self.layout.transaction_log_base(&self.config);
        LogFiles::new(dir, base_name)
    }

    fn checkpoint_log_files(&self) -> LogFiles {
        let (dir, base_name) = self.layout.checkpoint_log_base(&self.config);
        LogFiles::new(dir, base_name)
    }

    fn read_metadata(&self, position: MetaDataPosition) -> std::result::Result<Option<i64>, MetaDataError> {
        MetaDataStore::get_record(&self.layout.metadata_store(), position)
    }

    pub fn is_recovery_required(&self) -> std::result::Result<bool, RecoveryCheckError> {
        let log_files = self.transaction_log_files();
        let missing = missing_store_files(&self.layout);
        if missing.len() == self.layout.store_files().len() && log_files.is_empty()? {
            // Nothing here yet
            return Ok(false);
        }
        if !missing.is_empty() {
            return Ok(true);
        }

        let ids_need_repair = IdGenerators::probe_all(&self.layout)?
            .iter()
            .any(|(_, state)| *state != IdFileState::Clean);
        let store_id = self.read_metadata(MetaDataPosition::StoreId)?.unwrap_or(0) as u64;
        let last_committed = self
            .read_metadata(MetaDataPosition::LastCommittedTransaction)?
            .map_or(BASE_TX_ID, |v| v as TxId);

        let checkpoint_file = CheckpointFile::new(
            self.checkpoint_log_files(),
            self.config.checkpoint.clone(),
            store_id,
            INITIAL_LOG_VERSION,
        );
        let info = RecoveryStartLocator::new(&log_files, &checkpoint_file).locate(last_committed, ids_need_repair)?;
        Ok(info.needs_recovery())
    }

    /// Run recovery. Fatal errors are logged and reported to the monitors
    /// before being returned.
    pub fn perform_recovery(&self, force_recovery: bool) -> Result<RecoveryOutcome> {
        let result = self.recover(force_recovery);
        if let Err(e) = &result {
            if e.is_aborted() {
                warn!("Recovery aborted: {}", e);
            } else {
                error!("Recovery failed: {}", e);
            }
            self.monitors.failed_to_recover(&e.root_cause_message());
        }
        result
    }

    fn recover(&self, force_recovery: bool) -> Result<RecoveryOutcome> {
        let started = Instant::now();

        // Store files cannot be regenerated; this takes priority over any
        // other missing file
        let missing = missing_store_files(&self.layout);
        if !missing.is_empty() {
            return Err(RecoveryError::MissingStoreFiles { files: missing });
        }

        let store_id = self.read_metadata(MetaDataPosition::StoreId)?.unwrap_or(0) as u64;
        let last_committed = self
            .read_metadata(MetaDataPosition::LastCommittedTransaction)?
            .map_or(BASE_TX_ID, |v| v as TxId);

        let id_states = IdGenerators::probe_all(&self.layout)?;
        let dirty: Vec<StoreType> = id_states
            .iter()
            .filter(|(_, state)| *state == IdFileState::Dirty)
            .map(|(store_type, _)| *store_type)
            .collect();
        let ids_need_repair = id_states.iter().any(|(_, state)| *state != IdFileState::Clean);

        let log_files = self.transaction_log_files();
        let checkpoint_files = self.checkpoint_log_files();
        let stored_checkpoint_version = self.read_metadata(MetaDataPosition::CheckpointLogVersion)?;
        let checkpoint_version = resolve_checkpoint_log_version(&checkpoint_files, stored_checkpoint_version)?;
        let checkpoint_file = CheckpointFile::new(
            checkpoint_files,
            self.config.checkpoint.clone(),
            store_id,
            checkpoint_version,
        );

        let mut start_info =
            RecoveryStartLocator::new(&log_files, &checkpoint_file).locate(last_committed, ids_need_repair)?;

        if let Some(missing_logs) = &start_info.missing_logs {
            if self.config.fail_on_missing_files {
                return Err(RecoveryError::MissingLogs(missing_logs.clone()));
            }
            warn!("Recovering without missing transaction logs: {}", missing_logs);
            start_info.start_position = self.forced_start_position(&log_files, &start_info, last_committed, store_id)?;
        }

        if !start_info.needs_recovery() && !force_recovery {
            if stored_checkpoint_version != Some(checkpoint_version as i64) {
                self.write_metadata(MetaDataPosition::CheckpointLogVersion, checkpoint_version as i64)?;
            }
            self.monitors.no_commits_after_last_checkpoint(start_info.start_position);
            info!("No recovery required");
            return Ok(RecoveryOutcome::not_performed(last_committed));
        }

        info!("Recovery required from position {}, starting recovery", start_info.start_position);
        self.monitors.recovery_required(start_info.start_position);

        let page_cache = PageCache::new(self.config.page_cache_pages, self.tracers.page_cache.clone());
        let stores = NeoStores::open(&self.layout, &page_cache)?;
        let mut rebuilt = regenerate_missing_id_files(&self.layout, &stores, &self.monitors)?;
        let mut id_generators = IdGenerators::open_all(&self.layout)?;

        // Reverse phase
        let lowest_recovered_tx_id = self.reverse_scan(&log_files, start_info.start_position)?;
        self.monitors
            .reverse_store_recovery_completed(lowest_recovered_tx_id.unwrap_or(last_committed));
        self.guard.check_not_shutdown()?;

        // Forward phase
        let mut index_rebuilds = IndexRebuildSchedule::new();
        let replay = {
            let mut applier = TransactionApplier::new(&stores, &mut id_generators, &mut index_rebuilds);
            ForwardReplayEngine::new(&log_files, &self.guard, &self.monitors)
                .replay(start_info.start_position, &mut applier)?
        };
        if replay.transactions == 0 {
            self.monitors.no_commits_after_last_checkpoint(start_info.start_position);
        }
        if replay.discarded_transactions > 0 {
            warn!("Discarded {} incomplete transactions at the end of the log", replay.discarded_transactions);
        }

        if !dirty.is_empty() {
            warn!("Id generators {:?} were not closed cleanly, rebuilding them", dirty);
            rebuild_id_generators(&mut id_generators, &stores, &dirty, &self.monitors)?;
            rebuilt.extend(dirty);
        }
        self.guard.check_not_shutdown()?;

        stores.flush()?;
        stores.close()?;
        id_generators.close_all()?;
        let scheduled_index_rebuilds = index_rebuilds.schedule_all(self.index_populator.as_ref());

        let last_committed_tx_id = replay.last_tx_id.map_or(last_committed, |tx| tx.max(last_committed));
        let end_position = self.prepare_tail(&log_files, replay.end_position, last_committed_tx_id, store_id)?;
        self.write_metadata(MetaDataPosition::LastCommittedTransaction, last_committed_tx_id as i64)?;
        self.write_metadata(MetaDataPosition::LogVersion, end_position.log_version as i64)?;

        let checkpoint = checkpoint_file
            .append(end_position, RECOVERY_CHECKPOINT_REASON)
            .map_err(RecoveryError::CheckpointAppend)?;
        self.write_metadata(
            MetaDataPosition::CheckpointLogVersion,
            checkpoint_file.current_version() as i64,
        )?;

        let elapsed_millis = started.elapsed().as_millis() as u64;
        self.monitors.recovery_completed(replay.transactions, elapsed_millis);

        Ok(RecoveryOutcome {
            recovery_performed: true,
            recovered_transactions: replay.transactions,
            lowest_recovered_tx_id,
            last_committed_tx_id,
            rebuilt_id_generators: rebuilt,
            scheduled_index_rebuilds,
            checkpoint: Some(checkpoint),
        })
    }

    fn write_metadata(&self, position: MetaDataPosition, value: i64) -> Result<()> {
        MetaDataStore::set_record(&self.layout.metadata_store(), position, value)?;
        Ok(())
    }

    /// Walk back from the end of the log to `start`, returning the oldest
    /// transaction that will be recovered
    fn reverse_scan(&self, log_files: &LogFiles, start: LogPosition) -> Result<Option<TxId>> {
        let mut lowest: Option<TxId> = None;
        let cursor = ReversedTransactionCursor::open(log_files.clone(), start).map_err(RecoveryError::LogRead)?;
        for tx in cursor {
            let tx = tx.map_err(RecoveryError::LogRead)?;
            if let Some(previous) = lowest {
                if tx.tx_id >= previous {
                    return Err(RecoveryError::LogRead(LogError::Corrupt {
                        position: tx.start_position,
                        reason: format!("transaction {} precedes transaction {} in the log", tx.tx_id, previous),
                    }));
                }
            }
            lowest = Some(tx.tx_id);
        }
        Ok(lowest)
    }

    /// Start position when logs are missing and recovery is forced: the
    /// oldest segment of the newest unbroken run, or a fresh segment when
    /// no log is left at all
    fn forced_start_position(
        &self,
        log_files: &LogFiles,
        start_info: &RecoveryStartInformation,
        last_committed: TxId,
        store_id: u64,
    ) -> Result<LogPosition> {
        let versions = log_files.versions()?;
        if let Some(&highest) = versions.last() {
            let mut lowest = highest;
            while lowest > 0 && versions.binary_search(&(lowest - 1)).is_ok() {
                lowest -= 1;
            }
            let start = LogPosition::start_of(lowest);
            warn!("Starting recovery from the oldest available log at {}", start);
            return Ok(start);
        }

        let version: LogVersion = start_info
            .checkpoint
            .as_ref()
            .map_or(INITIAL_LOG_VERSION, |c| c.transaction_log_position.log_version + 1);
        log_files.create_segment(version, last_committed, store_id)?;
        warn!("No transaction logs left, created log version {}", version);
        Ok(LogPosition::start_of(version))
    }

    /// Cut everything after the last complete transaction from the highest
    /// segment, creating a segment if none exists. Returns where the next
    /// transaction will be appended.
    fn prepare_tail(
        &self,
        log_files: &LogFiles,
        end: LogPosition,
        last_committed_tx_id: TxId,
        store_id: u64,
    ) -> Result<LogPosition> {
        log_files.discard_torn_segment()?;
        let Some(highest) = log_files.highest_version()? else {
            log_files.create_segment(end.log_version, last_committed_tx_id, store_id)?;
            return Ok(LogPosition::start_of(end.log_version));
        };
        let position = if end.log_version == highest {
            end
        } else {
            LogPosition::start_of(highest)
        };
        log_files.truncate(position)?;
        Ok(position)
    }
}
