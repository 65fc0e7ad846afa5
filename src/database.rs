// BayunGraph Database
//
// Lifecycle of one database instance: create or recover on start, hand out
// write transactions while available, checkpoint on shutdown. Dropping a
// database without calling `shutdown` leaves it as a crash would.

use std::fs;
use std::io;
use std::sync::Arc;
use parking_lot::Mutex;
use log::{error, info, warn};
use thiserror::Error;

use crate::common::config::DatabaseConfig;
use crate::common::types::{
    current_time_millis, LogVersion, RecordId, TxId, BASE_TX_ID, INITIAL_LOG_VERSION, NO_NEXT_RECORD,
};
use crate::recovery::error::root_cause;
use crate::recovery::{
    AvailabilityGuard, DatabaseStartAborted, IndexPopulator, IndexRebuildSchedule, Monitors, RecordingIndexPopulator,
    RecoveryCheckError, RecoveryError, RecoveryFacade, RecoveryMonitor, RecoveryOutcome, TransactionApplier,
};
use crate::storage::error::StoreError;
use crate::storage::id::{IdError, IdGenerators};
use crate::storage::layout::{DatabaseLayout, StoreType};
use crate::storage::metadata::{MetaDataError, MetaDataPosition, MetaDataStore};
use crate::storage::neo_stores::{missing_store_files, NeoStores};
use crate::storage::page_cache::{PageCache, Tracers};
use crate::storage::record::{IndexDescriptor, NodeRecord, PropertyRecord, RelationshipRecord, SchemaRecord};
use crate::transaction::checkpoint::{resolve_checkpoint_log_version, CheckpointError, CheckpointFile};
use crate::transaction::log::{Command, LogError, LogFiles, TransactionLogWriter};

/// Reason recorded with the checkpoint written on clean shutdown
pub const SHUTDOWN_CHECKPOINT_REASON: &str = "Database shutdown";

/// Error type for database start and shutdown
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Recovery failed: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Recovery check failed: {0}")]
    RecoveryCheck(#[from] RecoveryCheckError),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Id file error: {0}")]
    IdError(#[from] IdError),

    #[error("Metadata store error: {0}")]
    MetaDataError(#[from] MetaDataError),

    #[error("Transaction log error: {0}")]
    LogError(#[from] LogError),

    #[error("Checkpoint log error: {0}")]
    CheckpointError(#[from] CheckpointError),
}

impl DatabaseError {
    /// Whether start stopped because the availability guard shut down
    pub fn is_aborted(&self) -> bool {
        matches!(self, DatabaseError::Recovery(e) if e.is_aborted())
    }

    /// Message of the innermost error in the source chain
    pub fn root_cause_message(&self) -> String {
        root_cause(self).to_string()
    }
}

/// Error type for write transactions
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Database is not available{}", unavailable_detail(.aborted))]
    DatabaseUnavailable { aborted: bool },

    #[error("Transaction log error: {0}")]
    LogError(#[from] LogError),

    #[error("Id file error: {0}")]
    IdError(#[from] IdError),

    #[error("Failed to apply transaction: {0}")]
    ApplyError(#[from] RecoveryError),
}

fn unavailable_detail(aborted: &bool) -> &'static str {
    if *aborted { ": start was aborted" } else { "" }
}

/// Where a database handle is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    Available,
    /// Start failed; see `GraphDatabase::failure_cause`
    Failed,
    Shutdown,
}

/// Open stores, id generators and logs of an available database
struct StorageEngine {
    stores: NeoStores,
    /// Also serializes commits
    id_generators: Mutex<IdGenerators>,
    log_writer: TransactionLogWriter,
    checkpoints: CheckpointFile,
}

/// Configures and starts a `GraphDatabase`
pub struct GraphDatabaseBuilder {
    layout: DatabaseLayout,
    config: DatabaseConfig,
    tracers: Tracers,
    monitors: Monitors,
    guard: Option<Arc<AvailabilityGuard>>,
    index_populator: Option<Arc<dyn IndexPopulator>>,
}

impl GraphDatabaseBuilder {
    pub fn config(mut self, config: DatabaseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tracers(mut self, tracers: Tracers) -> Self {
        self.tracers = tracers;
        self
    }

    /// Register a recovery monitor
    pub fn monitor(mut self, monitor: Arc<dyn RecoveryMonitor>) -> Self {
        self.monitors.add(monitor);
        self
    }

    pub fn monitors(mut self, monitors: Monitors) -> Self {
        self.monitors = monitors;
        self
    }

    /// Share a guard with collaborators that may shut the database down
    /// while it starts
    pub fn availability_guard(mut self, guard: Arc<AvailabilityGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn index_populator(mut self, index_populator: Arc<dyn IndexPopulator>) -> Self {
        self.index_populator = Some(index_populator);
        self
    }

    /// Start the database. Always returns a handle; a failed start is
    /// reported through `state` and `failure_cause`.
    pub fn start(self) -> GraphDatabase {
        let mut db = GraphDatabase {
            layout: self.layout,
            config: self.config,
            tracers: self.tracers,
            guard: self.guard.unwrap_or_default(),
            index_populator: self
                .index_populator
                .unwrap_or_else(|| Arc::new(RecordingIndexPopulator::new())),
            engine: None,
            failure: None,
            recovery_outcome: None,
        };

        match db.start_engine(&self.monitors) {
            Ok(engine) => {
                if db.guard.make_available() {
                    info!("Database {:?} is available", db.layout.database_dir());
                    db.engine = Some(engine);
                } else {
                    // Shut down between recovery and availability
                    let aborted = db.guard.check_not_shutdown().err().unwrap_or_else(|| DatabaseStartAborted {
                        reason: "Database became unavailable while starting".to_string(),
                    });
                    warn!("Database start aborted: {}", aborted);
                    db.failure = Some(DatabaseError::Recovery(RecoveryError::Aborted(aborted)));
                }
            }
            Err(e) => {
                error!("Database {:?} failed to start: {}", db.layout.database_dir(), e);
                db.failure = Some(e);
            }
        }
        db
    }
}

/// A database instance
pub struct GraphDatabase {
    layout: DatabaseLayout,
    config: DatabaseConfig,
    tracers: Tracers,
    guard: Arc<AvailabilityGuard>,
    index_populator: Arc<dyn IndexPopulator>,
    engine: Option<StorageEngine>,
    failure: Option<DatabaseError>,
    recovery_outcome: Option<RecoveryOutcome>,
}

impl GraphDatabase {
    pub fn builder(layout: DatabaseLayout) -> GraphDatabaseBuilder {
        GraphDatabaseBuilder {
            layout,
            config: DatabaseConfig::default(),
            tracers: Tracers::new(),
            monitors: Monitors::new(),
            guard: None,
            index_populator: None,
        }
    }

    /// Start with the default configuration
    pub fn open(layout: DatabaseLayout) -> GraphDatabase {
        Self::builder(layout).start()
    }

    fn transaction_log_files(&self) -> LogFiles {
        let (dir, base_name) = self.layout.transaction_log_base(&self.config);
        LogFiles::new(dir, base_name)
    }

    fn checkpoint_log_files(&self) -> LogFiles {
        let (dir, base_name) = self.layout.checkpoint_log_base(&self.config);
        LogFiles::new(dir, base_name)
    }

    fn is_new_database(&self, log_files: &LogFiles) -> Result<bool, DatabaseError> {
        Ok(!self.layout.metadata_store().exists()
            && missing_store_files(&self.layout).len() == self.layout.store_files().len()
            && log_files.is_empty()?)
    }

    fn create_store(&self) -> Result<(), DatabaseError> {
        fs::create_dir_all(self.layout.database_dir())?;
        fs::create_dir_all(self.layout.transaction_logs_dir())?;
        MetaDataStore::create(&self.layout.metadata_store(), current_time_millis())?;
        let page_cache = PageCache::new(self.config.page_cache_pages, self.tracers.page_cache.clone());
        NeoStores::create(&self.layout, &page_cache)?.close()?;
        IdGenerators::create_all(&self.layout)?;
        info!("Created new database in {:?}", self.layout.database_dir());
        Ok(())
    }

    fn read_metadata(&self, position: MetaDataPosition) -> Result<Option<i64>, DatabaseError> {
        Ok(MetaDataStore::get_record(&self.layout.metadata_store(), position)?)
    }

    fn start_engine(&mut self, monitors: &Monitors) -> Result<StorageEngine, DatabaseError> {
        let log_files = self.transaction_log_files();
        if self.is_new_database(&log_files)? {
            self.create_store()?;
        } else {
            let facade = RecoveryFacade::new(self.layout.clone(), self.config.clone())
                .with_tracers(self.tracers.clone())
                .with_monitors(monitors.clone())
                .with_guard(self.guard.clone())
                .with_index_populator(self.index_populator.clone());
            if facade.is_recovery_required()? {
                info!("Database {:?} needs recovery", self.layout.database_dir());
                self.recovery_outcome = Some(facade.perform_recovery(false)?);
            }
        }
        self.guard.check_not_shutdown().map_err(RecoveryError::from)?;

        let page_cache = PageCache::new(self.config.page_cache_pages, self.tracers.page_cache.clone());
        let stores = NeoStores::open(&self.layout, &page_cache)?;
        let id_generators = IdGenerators::open_all(&self.layout)?;

        let store_id = self.read_metadata(MetaDataPosition::StoreId)?.unwrap_or(0) as u64;
        let last_committed = self
            .read_metadata(MetaDataPosition::LastCommittedTransaction)?
            .map_or(BASE_TX_ID, |v| v as TxId);
        let log_version = self
            .read_metadata(MetaDataPosition::LogVersion)?
            .map_or(INITIAL_LOG_VERSION, |v| v as LogVersion);
        let log_writer = TransactionLogWriter::open(
            log_files,
            self.config.transaction_log.clone(),
            store_id,
            last_committed,
            log_version,
        )?;

        let checkpoint_log_files = self.checkpoint_log_files();
        let stored_version = self.read_metadata(MetaDataPosition::CheckpointLogVersion)?;
        let checkpoint_version = resolve_checkpoint_log_version(&checkpoint_log_files, stored_version)?;
        let checkpoints = CheckpointFile::new(
            checkpoint_log_files,
            self.config.checkpoint.clone(),
            store_id,
            checkpoint_version,
        );

        Ok(StorageEngine {
            stores,
            id_generators: Mutex::new(id_generators),
            log_writer,
            checkpoints,
        })
    }

    pub fn layout(&self) -> &DatabaseLayout {
        &self.layout
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn tracers(&self) -> &Tracers {
        &self.tracers
    }

    pub fn availability_guard(&self) -> &Arc<AvailabilityGuard> {
        &self.guard
    }

    pub fn state(&self) -> DatabaseState {
        if self.failure.is_some() {
            DatabaseState::Failed
        } else if self.engine.is_none() || self.guard.is_shutdown() {
            DatabaseState::Shutdown
        } else {
            DatabaseState::Available
        }
    }

    pub fn is_available(&self) -> bool {
        self.state() == DatabaseState::Available
    }

    /// Why start failed, if it did
    pub fn failure_cause(&self) -> Option<&DatabaseError> {
        self.failure.as_ref()
    }

    /// What recovery did during start, if it ran
    pub fn recovery_outcome(&self) -> Option<&RecoveryOutcome> {
        self.recovery_outcome.as_ref()
    }

    /// Id of the last committed transaction
    pub fn last_committed_tx_id(&self) -> Option<TxId> {
        self.engine.as_ref().map(|engine| engine.log_writer.last_committed_tx_id())
    }

    /// Begin a write transaction
    pub fn begin_transaction(&self) -> Result<Transaction<'_>, TransactionError> {
        if let Some(failure) = &self.failure {
            return Err(TransactionError::DatabaseUnavailable {
                aborted: failure.is_aborted(),
            });
        }
        match &self.engine {
            Some(engine) if self.guard.is_available() => Ok(Transaction {
                engine,
                index_populator: self.index_populator.as_ref(),
                commands: Vec::new(),
                allocated: Vec::new(),
                committed: false,
            }),
            _ => Err(TransactionError::DatabaseUnavailable { aborted: false }),
        }
    }

    /// Clean shutdown: flush the stores, close the id files and write a
    /// checkpoint at the end of the transaction log
    pub fn shutdown(mut self) -> Result<(), DatabaseError> {
        self.guard.shutdown(SHUTDOWN_CHECKPOINT_REASON);
        let Some(engine) = self.engine.take() else {
            info!("Database {:?} was not running", self.layout.database_dir());
            return Ok(());
        };

        let StorageEngine {
            stores,
            id_generators,
            log_writer,
            checkpoints,
        } = engine;
        stores.flush()?;
        stores.close()?;
        id_generators.into_inner().close_all()?;
        log_writer.sync()?;

        let metadata = self.layout.metadata_store();
        let position = log_writer.current_position();
        MetaDataStore::set_record(
            &metadata,
            MetaDataPosition::LastCommittedTransaction,
            log_writer.last_committed_tx_id() as i64,
        )?;
        MetaDataStore::set_record(&metadata, MetaDataPosition::LogVersion, position.log_version as i64)?;
        checkpoints.append(position, SHUTDOWN_CHECKPOINT_REASON)?;
        MetaDataStore::set_record(
            &metadata,
            MetaDataPosition::CheckpointLogVersion,
            checkpoints.current_version() as i64,
        )?;
        info!("Database {:?} shut down at {}", self.layout.database_dir(), position);
        Ok(())
    }
}

/// A write transaction. Changes become durable and visible on `commit`;
/// dropping an uncommitted transaction releases the ids it allocated.
pub struct Transaction<'db> {
    engine: &'db StorageEngine,
    index_populator: &'db dyn IndexPopulator,
    commands: Vec<Command>,
    allocated: Vec<(StoreType, RecordId)>,
    committed: bool,
}

impl<'db> Transaction<'db> {
    fn allocate(&mut self, store_type: StoreType) -> Result<RecordId, TransactionError> {
        let id = self.engine.id_generators.lock().get_mut(store_type)?.next_id();
        self.allocated.push((store_type, id));
        Ok(id)
    }

    pub fn create_node(&mut self, labels: u64) -> Result<RecordId, TransactionError> {
        let id = self.allocate(StoreType::Node)?;
        self.commands.push(Command::Node(NodeRecord::new(id, labels)));
        Ok(id)
    }

    pub fn create_relationship(
        &mut self,
        first_node: RecordId,
        second_node: RecordId,
        rel_type: u32,
    ) -> Result<RecordId, TransactionError> {
        let id = self.allocate(StoreType::Relationship)?;
        self.commands
            .push(Command::Relationship(RelationshipRecord::new(id, first_node, second_node, rel_type)));
        Ok(id)
    }

    pub fn set_property(&mut self, key_id: u32, value: i64) -> Result<RecordId, TransactionError> {
        let id = self.allocate(StoreType::Property)?;
        self.commands
            .push(Command::Property(PropertyRecord::new(id, key_id, value, NO_NEXT_RECORD)));
        Ok(id)
    }

    /// Declare an index; it is populated after commit
    pub fn create_index(&mut self, label_id: u32, property_key_id: u32) -> Result<IndexDescriptor, TransactionError> {
        let id = self.allocate(StoreType::Schema)?;
        let record = SchemaRecord::new(id, label_id, property_key_id);
        let descriptor = record.descriptor();
        self.commands.push(Command::Schema(record));
        Ok(descriptor)
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Append the transaction to the log, then apply it to the stores. A
    /// transaction without changes writes nothing and returns the last
    /// committed transaction id.
    pub fn commit(mut self) -> Result<TxId, TransactionError> {
        if self.commands.is_empty() {
            return Ok(self.engine.log_writer.last_committed_tx_id());
        }
        let mut id_generators = self.engine.id_generators.lock();
        let appended = self.engine.log_writer.append_transaction(&self.commands)?;
        // Durable from here on; the ids now belong to the log
        self.committed = true;

        let mut index_rebuilds = IndexRebuildSchedule::new();
        TransactionApplier::new(&self.engine.stores, &mut id_generators, &mut index_rebuilds)
            .apply(&self.commands)?;
        index_rebuilds.schedule_all(self.index_populator);
        Ok(appended.tx_id)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed || self.allocated.is_empty() {
            return;
        }
        let mut id_generators = self.engine.id_generators.lock();
        for (store_type, id) in self.allocated.drain(..) {
            if let Ok(generator) = id_generators.get_mut(store_type) {
                generator.mark_free(id);
            }
        }
    }
}
