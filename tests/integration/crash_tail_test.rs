// Crash Tail and Corruption Integration Tests

use anyhow::Result;
use std::fs;

use bayungraph::common::types::BASE_TX_ID;
use bayungraph::transaction::log::{LogError, TransactionCursor};
use bayungraph::{
    is_recovery_required, perform_recovery, DatabaseConfig, DatabaseError, DatabaseState, GraphDatabase, LogPosition,
    Monitors, RecoveryError, Tracers,
};

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[test]
fn test_segment_torn_during_rotation_is_dropped() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    {
        let db = GraphDatabase::open(layout.clone());
        commit_transactions(&db, 3)?;
    }
    // The next segment was created but its header never reached the disk
    let logs = transaction_logs(&layout, &config);
    fs::write(logs.path_for(1), [0u8; 10])?;
    assert!(is_recovery_required(&layout, &config)?);

    let monitor = RecordingMonitor::new();
    let db = GraphDatabase::builder(layout.clone()).monitor(monitor.clone()).start();
    assert_eq!(db.state(), DatabaseState::Available);
    assert_eq!(*monitor.completed.lock(), vec![3]);
    assert_eq!(db.last_committed_tx_id(), Some(BASE_TX_ID + 3));
    assert!(!logs.path_for(1).exists());

    let mut tx = db.begin_transaction()?;
    tx.create_node(0)?;
    assert_eq!(tx.commit()?, BASE_TX_ID + 4);
    db.shutdown()?;
    assert!(!is_recovery_required(&layout, &config)?);
    Ok(())
}

#[test]
fn test_corrupt_entry_inside_the_log_fails_start() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    {
        let db = GraphDatabase::open(layout.clone());
        commit_transactions(&db, 3)?;
    }

    // Flip a byte in the payload of the second transaction's start entry
    let logs = transaction_logs(&layout, &config);
    let second = TransactionCursor::open(logs.clone(), LogPosition::start_of(0))?
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("second transaction not found"))??;
    let path = logs.path_for(0);
    let mut bytes = fs::read(&path)?;
    bytes[second.start_position.byte_offset as usize + 10] ^= 0xFF;
    fs::write(&path, &bytes)?;

    let monitor = RecordingMonitor::new();
    let db = GraphDatabase::builder(layout).monitor(monitor.clone()).start();
    assert_eq!(db.state(), DatabaseState::Failed);
    assert!(
        matches!(
            db.failure_cause(),
            Some(DatabaseError::Recovery(RecoveryError::LogRead(LogError::Corrupt { .. })))
        ),
        "unexpected failure: {:?}",
        db.failure_cause()
    );
    assert!(monitor.completed.lock().is_empty());
    assert_eq!(monitor.failures.lock().len(), 1);
    assert!(db.begin_transaction().is_err());
    Ok(())
}

#[test]
fn test_failed_recovery_checkpoint_is_fatal() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    {
        let db = GraphDatabase::open(layout.clone());
        commit_transactions(&db, 2)?;
    }
    // Nothing can be created where the recovery checkpoint goes
    fs::create_dir_all(checkpoint_logs(&layout, &config).path_for(0))?;

    let monitor = RecordingMonitor::new();
    let result = perform_recovery(
        &layout,
        &config,
        &Tracers::new(),
        &Monitors::new().with(monitor.clone()),
        false,
    );
    assert!(
        matches!(result, Err(RecoveryError::CheckpointAppend(_))),
        "unexpected result: {:?}",
        result
    );
    assert!(monitor.completed.lock().is_empty());
    assert_eq!(monitor.failures.lock().len(), 1);
    assert!(reachable_checkpoints(&layout, &config)?.is_empty());
    Ok(())
}
