// Recovery Integration Tests

use anyhow::Result;
use std::sync::Arc;

use bayungraph::common::types::BASE_TX_ID;
use bayungraph::recovery::{RecordingIndexPopulator, RecoveryFacade};
use bayungraph::storage::id::{IdFileState, IdGenerator, IdGenerators};
use bayungraph::{
    is_recovery_required, perform_recovery, AvailabilityGuard, DatabaseConfig, DatabaseState, GraphDatabase,
    Monitors, StoreType, Tracers, TransactionError,
};

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[test]
fn test_recovery_check_is_idempotent() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    {
        let db = GraphDatabase::open(layout.clone());
        commit_transactions(&db, 3)?;
        // Dropped without shutdown
    }

    let before = snapshot(&layout)?;
    let results = (0..5)
        .map(|_| is_recovery_required(&layout, &config))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    assert_eq!(results, vec![true; 5]);
    assert_eq!(snapshot(&layout)?, before, "recovery check must not write");
    Ok(())
}

#[test]
fn test_clean_shutdown_needs_no_recovery() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    let db = GraphDatabase::open(layout.clone());
    create_nodes(&db, 10)?;
    db.shutdown()?;

    assert!(!is_recovery_required(&layout, &config)?);
    assert!(!is_recovery_required(&layout, &config)?);

    let monitor = RecordingMonitor::new();
    let db = GraphDatabase::builder(layout.clone()).monitor(monitor.clone()).start();
    assert_eq!(db.state(), DatabaseState::Available);
    assert_eq!(monitor.recovery_required.load(std::sync::atomic::Ordering::SeqCst), 0);
    db.shutdown()?;
    Ok(())
}

#[test]
fn test_crash_recovery_replays_committed_transactions() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let last_tx = {
        let db = GraphDatabase::open(layout.clone());
        create_nodes(&db, 4)?;
        commit_transactions(&db, 2)?
    };
    assert_eq!(last_tx, BASE_TX_ID + 3);

    let monitor = RecordingMonitor::new();
    let tracers = Tracers::new();
    let db = GraphDatabase::builder(layout.clone())
        .monitor(monitor.clone())
        .tracers(tracers.clone())
        .start();
    assert_eq!(db.state(), DatabaseState::Available);
    assert!(tracers.page_cache.faults() > 0);
    assert!(tracers.page_cache.flushes() > 0);
    assert_eq!(
        *monitor.recovered_transactions.lock(),
        vec![BASE_TX_ID + 1, BASE_TX_ID + 2, BASE_TX_ID + 3]
    );
    assert_eq!(*monitor.reverse_completed.lock(), vec![BASE_TX_ID + 1]);
    assert_eq!(*monitor.completed.lock(), vec![3]);
    assert_eq!(db.last_committed_tx_id(), Some(last_tx));

    // Ids 0..6 are in use again after the rebuild
    let mut tx = db.begin_transaction()?;
    assert_eq!(tx.create_node(0)?, 6);
    assert_eq!(tx.commit()?, last_tx + 1);
    db.shutdown()?;

    assert!(!is_recovery_required(&layout, &DatabaseConfig::default())?);
    Ok(())
}

#[test]
fn test_recovered_indexes_are_scheduled_once() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let descriptor = {
        let db = GraphDatabase::open(layout.clone());
        let mut tx = db.begin_transaction()?;
        let descriptor = tx.create_index(1, 2)?;
        tx.commit()?;
        create_nodes(&db, 2)?;
        descriptor
    };

    let populator = Arc::new(RecordingIndexPopulator::new());
    let db = GraphDatabase::builder(layout)
        .index_populator(populator.clone())
        .start();
    assert_eq!(db.state(), DatabaseState::Available);
    assert_eq!(populator.scheduled(), vec![descriptor]);
    Ok(())
}

#[test]
fn test_dirty_id_generator_is_repaired_without_commits() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    let db = GraphDatabase::open(layout.clone());
    create_nodes(&db, 3)?;
    db.shutdown()?;

    {
        let mut generator = IdGenerator::open(&layout.id_file(StoreType::Node), StoreType::Node)?;
        let mut marker = generator.marker();
        marker.mark_used(1);
        // Dropped without close
    }
    assert!(IdGenerators::probe_all(&layout)?.contains(&(StoreType::Node, IdFileState::Dirty)));

    let monitor = RecordingMonitor::new();
    perform_recovery(&layout, &config, &Tracers::new(), &Monitors::new().with(monitor.clone()), false)?;

    assert_eq!(monitor.no_commits.lock().len(), 1);
    assert!(monitor.recovered_transactions.lock().is_empty());
    assert!(IdGenerators::probe_all(&layout)?
        .iter()
        .all(|(_, state)| *state == IdFileState::Clean));
    assert!(!is_recovery_required(&layout, &config)?);
    Ok(())
}

#[test]
fn test_abort_during_reverse_recovery() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    {
        let db = GraphDatabase::open(layout.clone());
        commit_transactions(&db, 3)?;
    }

    let guard = Arc::new(AvailabilityGuard::new());
    let monitor = RecordingMonitor::stopping(guard.clone());
    let db = GraphDatabase::builder(layout.clone())
        .availability_guard(guard)
        .monitor(monitor.clone())
        .start();

    assert_eq!(monitor.reverse_completed.lock().len(), 1);
    assert!(monitor.completed.lock().is_empty(), "recovery must not complete");
    assert_eq!(db.state(), DatabaseState::Failed);
    assert!(!db.is_available());
    assert!(db.failure_cause().is_some_and(|e| e.is_aborted()));
    assert!(matches!(
        db.begin_transaction(),
        Err(TransactionError::DatabaseUnavailable { aborted: true })
    ));
    drop(db);

    // Nothing was checkpointed, so the next start recovers everything
    assert!(is_recovery_required(&layout, &DatabaseConfig::default())?);
    let monitor = RecordingMonitor::new();
    let db = GraphDatabase::builder(layout).monitor(monitor.clone()).start();
    assert_eq!(db.state(), DatabaseState::Available);
    assert_eq!(*monitor.completed.lock(), vec![3]);
    Ok(())
}

#[test]
fn test_forced_recovery_without_pending_work() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    let db = GraphDatabase::open(layout.clone());
    create_nodes(&db, 1)?;
    db.shutdown()?;

    let before = reachable_checkpoints(&layout, &config)?.len();
    let outcome = RecoveryFacade::new(layout.clone(), config.clone()).perform_recovery(true)?;
    assert!(outcome.recovery_performed);
    assert_eq!(outcome.recovered_transactions, 0);
    assert_eq!(reachable_checkpoints(&layout, &config)?.len(), before + 1);

    let outcome = RecoveryFacade::new(layout.clone(), config).perform_recovery(false)?;
    assert!(!outcome.recovery_performed);
    Ok(())
}
