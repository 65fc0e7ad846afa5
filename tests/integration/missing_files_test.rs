// Missing File Integration Tests

use anyhow::Result;
use std::fs;

use bayungraph::common::types::BASE_TX_ID;
use bayungraph::storage::id::{IdFileState, IdGenerator};
use bayungraph::storage::{MetaDataPosition, MetaDataStore};
use bayungraph::{is_recovery_required, DatabaseConfig, DatabaseState, GraphDatabase, StoreType, TransactionError};

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[test]
fn test_missing_transaction_logs_fail_start() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    let db = GraphDatabase::open(layout.clone());
    create_nodes(&db, 5)?;
    db.shutdown()?;

    transaction_logs(&layout, &config).delete_all()?;
    assert!(is_recovery_required(&layout, &config)?);

    let monitor = RecordingMonitor::new();
    let db = GraphDatabase::builder(layout).monitor(monitor.clone()).start();
    assert_eq!(db.state(), DatabaseState::Failed);
    let cause = db.failure_cause().map(|e| e.root_cause_message()).unwrap_or_default();
    assert!(
        cause.contains("Transaction logs are missing and recovery is not possible"),
        "unexpected root cause: {}",
        cause
    );
    assert!(!db.failure_cause().is_some_and(|e| e.is_aborted()));
    assert_eq!(monitor.failures.lock().len(), 1);
    assert!(matches!(
        db.begin_transaction(),
        Err(TransactionError::DatabaseUnavailable { aborted: false })
    ));
    Ok(())
}

#[test]
fn test_missing_transaction_logs_with_forced_recovery() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let db = GraphDatabase::open(layout.clone());
    create_nodes(&db, 5)?;
    db.shutdown()?;
    transaction_logs(&layout, &DatabaseConfig::default()).delete_all()?;

    let config = DatabaseConfig::force_recovery();
    let db = GraphDatabase::builder(layout.clone()).config(config.clone()).start();
    assert_eq!(db.state(), DatabaseState::Available);
    assert_eq!(db.last_committed_tx_id(), Some(BASE_TX_ID + 1));

    let mut tx = db.begin_transaction()?;
    assert_eq!(tx.create_node(0)?, 5);
    assert_eq!(tx.commit()?, BASE_TX_ID + 2);
    db.shutdown()?;
    assert!(!is_recovery_required(&layout, &config)?);
    Ok(())
}

#[test]
fn test_missing_store_file_reported_before_id_file() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let db = GraphDatabase::open(layout.clone());
    create_nodes(&db, 3)?;
    db.shutdown()?;

    fs::remove_file(layout.store_file(StoreType::Node))?;
    fs::remove_file(layout.id_file(StoreType::Node))?;
    assert!(is_recovery_required(&layout, &DatabaseConfig::default())?);

    let db = GraphDatabase::open(layout);
    assert_eq!(db.state(), DatabaseState::Failed);
    let cause = db.failure_cause().map(|e| e.root_cause_message()).unwrap_or_default();
    assert!(cause.contains("neostore.nodestore.db"), "unexpected root cause: {}", cause);
    assert!(cause.contains("is(are) missing and recovery is not possible"));
    assert!(!cause.contains("nodestore.db.id"));
    Ok(())
}

#[test]
fn test_missing_id_file_is_regenerated() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    let db = GraphDatabase::open(layout.clone());
    create_nodes(&db, 4)?;
    db.shutdown()?;

    fs::remove_file(layout.id_file(StoreType::Node))?;
    assert!(is_recovery_required(&layout, &config)?);

    let db = GraphDatabase::open(layout.clone());
    assert_eq!(db.state(), DatabaseState::Available);
    let outcome = db.recovery_outcome().cloned();
    assert!(outcome.is_some_and(|o| o.rebuilt_id_generators.contains(&StoreType::Node)));
    assert!(
        MetaDataStore::get_record(&layout.metadata_store(), MetaDataPosition::LastMissingStoreFilesRecoveryTimestamp)?
            .is_some()
    );

    let mut tx = db.begin_transaction()?;
    assert_eq!(tx.create_node(0)?, 4);
    tx.commit()?;
    db.shutdown()?;
    assert_eq!(IdGenerator::probe(&layout.id_file(StoreType::Node))?, IdFileState::Clean);
    Ok(())
}

#[test]
fn test_truncated_id_file_is_regenerated() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    let db = GraphDatabase::open(layout.clone());
    create_nodes(&db, 3)?;
    db.shutdown()?;

    // A clean close cut short by a crash
    fs::write(layout.id_file(StoreType::Node), b"")?;
    assert_eq!(IdGenerator::probe(&layout.id_file(StoreType::Node))?, IdFileState::Corrupt);
    assert!(is_recovery_required(&layout, &config)?);

    let db = GraphDatabase::open(layout.clone());
    assert_eq!(db.state(), DatabaseState::Available);
    assert!(db
        .recovery_outcome()
        .is_some_and(|o| o.rebuilt_id_generators.contains(&StoreType::Node)));

    let mut tx = db.begin_transaction()?;
    assert_eq!(tx.create_node(0)?, 3);
    tx.commit()?;
    db.shutdown()?;
    assert!(!is_recovery_required(&layout, &config)?);
    Ok(())
}

#[test]
fn test_empty_directory_creates_database() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    assert!(!is_recovery_required(&layout, &config)?);

    let db = GraphDatabase::open(layout.clone());
    assert_eq!(db.state(), DatabaseState::Available);
    assert!(reachable_checkpoints(&layout, &config)?.is_empty());
    assert_eq!(transaction_logs(&layout, &config).versions()?, vec![0]);
    db.shutdown()?;
    Ok(())
}
