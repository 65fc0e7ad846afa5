// Checkpoint Integration Tests

use anyhow::Result;

use bayungraph::recovery::RecoveryFacade;
use bayungraph::storage::{MetaDataPosition, MetaDataStore};
use bayungraph::{is_recovery_required, perform_recovery, DatabaseConfig, GraphDatabase, Monitors, Tracers};

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[test]
fn test_recovery_after_removed_checkpoint_writes_two_checkpoints() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    let db = GraphDatabase::open(layout.clone());
    create_nodes(&db, 10)?;
    db.shutdown()?;

    let removed = remove_last_checkpoint(&layout, &config)?;
    assert_eq!(removed.reason, "Database shutdown");
    assert!(reachable_checkpoints(&layout, &config)?.is_empty());
    assert!(is_recovery_required(&layout, &config)?);

    perform_recovery(&layout, &config, &Tracers::new(), &Monitors::new(), false)?;
    let db = GraphDatabase::open(layout.clone());
    assert!(db.is_available());
    db.shutdown()?;

    let checkpoints = reachable_checkpoints(&layout, &config)?;
    assert_eq!(
        checkpoints.iter().map(|c| c.reason.as_str()).collect::<Vec<_>>(),
        vec!["Recovery completed.", "Database shutdown"]
    );
    assert!(!is_recovery_required(&layout, &config)?);
    Ok(())
}

#[test]
fn test_shutdown_checkpoint_points_at_log_end() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::default();
    let db = GraphDatabase::open(layout.clone());
    commit_transactions(&db, 4)?;
    db.shutdown()?;

    let checkpoints = reachable_checkpoints(&layout, &config)?;
    assert_eq!(checkpoints.len(), 1);
    let logs = transaction_logs(&layout, &config);
    let end = checkpoints[0].transaction_log_position;
    assert_eq!(end.log_version, 0);
    assert_eq!(end.byte_offset, logs.file_size(0)?);
    Ok(())
}

#[test]
fn test_checkpoint_log_rotation_survives_restart() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let mut config = DatabaseConfig::default();
    config.checkpoint.rotation_threshold = 1;

    for _ in 0..3 {
        let db = GraphDatabase::builder(layout.clone()).config(config.clone()).start();
        create_nodes(&db, 1)?;
        db.shutdown()?;
    }

    let files = checkpoint_logs(&layout, &config);
    assert_eq!(files.versions()?, vec![0, 1, 2]);
    assert_eq!(reachable_checkpoints(&layout, &config)?.len(), 3);
    assert_eq!(
        MetaDataStore::get_record(&layout.metadata_store(), MetaDataPosition::CheckpointLogVersion)?,
        Some(2)
    );
    assert!(!is_recovery_required(&layout, &config)?);
    Ok(())
}

fn remove_all_logs(layout: &bayungraph::DatabaseLayout, config: &DatabaseConfig) -> Result<()> {
    transaction_logs(layout, config).delete_all()?;
    checkpoint_logs(layout, config).delete_all()?;
    Ok(())
}

#[test]
fn test_implausible_checkpoint_log_version_is_reset() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::force_recovery();
    let db = GraphDatabase::builder(layout.clone()).config(config.clone()).start();
    create_nodes(&db, 2)?;
    db.shutdown()?;

    remove_all_logs(&layout, &config)?;
    MetaDataStore::set_record(&layout.metadata_store(), MetaDataPosition::CheckpointLogVersion, -42)?;

    perform_recovery(&layout, &config, &Tracers::new(), &Monitors::new(), false)?;
    assert_eq!(
        MetaDataStore::get_record(&layout.metadata_store(), MetaDataPosition::CheckpointLogVersion)?,
        Some(0)
    );
    Ok(())
}

#[test]
fn test_plausible_checkpoint_log_version_is_kept() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let config = DatabaseConfig::force_recovery();
    let db = GraphDatabase::builder(layout.clone()).config(config.clone()).start();
    create_nodes(&db, 2)?;
    db.shutdown()?;

    remove_all_logs(&layout, &config)?;
    MetaDataStore::set_record(&layout.metadata_store(), MetaDataPosition::CheckpointLogVersion, 18)?;

    let outcome = RecoveryFacade::new(layout.clone(), config.clone()).perform_recovery(false)?;
    assert_eq!(outcome.checkpoint.map(|c| c.checkpoint_log_version()), Some(18));
    assert_eq!(
        MetaDataStore::get_record(&layout.metadata_store(), MetaDataPosition::CheckpointLogVersion)?,
        Some(18)
    );

    // The database starts from the repaired logs
    let db = GraphDatabase::builder(layout).config(config).start();
    assert!(db.is_available());
    create_nodes(&db, 1)?;
    db.shutdown()?;
    Ok(())
}
