// Reverse Transaction Cursor Integration Tests

use anyhow::Result;
use tempfile::TempDir;

use bayungraph::common::config::TransactionLogConfig;
use bayungraph::common::types::{TxId, BASE_TX_ID};
use bayungraph::storage::record::NodeRecord;
use bayungraph::transaction::log::{Command, LogFiles, ReversedTransactionCursor, TransactionLogWriter};
use bayungraph::{DatabaseConfig, DatabaseState, GraphDatabase, LogPosition};

#[path = "../common/mod.rs"]
mod common;
use common::*;

// Write one segment per entry of `counts`, holding that many transactions
fn write_segments(temp_dir: &TempDir, counts: &[usize]) -> Result<LogFiles> {
    let config = TransactionLogConfig::default();
    let files = LogFiles::new(temp_dir.path(), config.log_file_base_name.clone());
    let writer = TransactionLogWriter::open(files.clone(), config, 1, BASE_TX_ID, 0)?;
    let mut node_id = 0;
    for (i, count) in counts.iter().enumerate() {
        if i > 0 {
            writer.rotate()?;
        }
        for _ in 0..*count {
            writer.append_transaction(&[Command::Node(NodeRecord::new(node_id, 0))])?;
            node_id += 1;
        }
    }
    Ok(files)
}

fn reverse_ids(files: LogFiles, lower_bound: LogPosition) -> Result<Vec<TxId>> {
    let mut ids = Vec::new();
    for tx in ReversedTransactionCursor::open(files, lower_bound)? {
        ids.push(tx?.tx_id);
    }
    Ok(ids)
}

fn assert_strictly_descending(ids: &[TxId]) {
    for pair in ids.windows(2) {
        assert!(pair[0] > pair[1], "{} is not above {}", pair[0], pair[1]);
    }
}

#[test]
fn test_reverse_over_current_segments() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let files = write_segments(&temp_dir, &[5, 3, 8])?;

    // The last two segments are current
    let ids = reverse_ids(files.clone(), LogPosition::start_of(1))?;
    assert_eq!(ids.len(), 11);
    assert_strictly_descending(&ids);
    assert_eq!(ids.first(), Some(&(BASE_TX_ID + 16)));
    assert_eq!(ids.last(), Some(&(BASE_TX_ID + 6)));

    let all = reverse_ids(files, LogPosition::start_of(0))?;
    assert_eq!(all.len(), 16);
    assert_strictly_descending(&all);
    Ok(())
}

#[test]
fn test_reverse_over_interspersed_empty_segments() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let files = write_segments(&temp_dir, &[5, 0, 2, 0, 3])?;
    assert_eq!(files.versions()?, vec![0, 1, 2, 3, 4]);

    let ids = reverse_ids(files, LogPosition::start_of(0))?;
    assert_eq!(ids.len(), 10);
    assert_strictly_descending(&ids);
    Ok(())
}

#[test]
fn test_trailing_empty_segment() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let files = write_segments(&temp_dir, &[2, 0])?;

    let ids = reverse_ids(files, LogPosition::start_of(0))?;
    assert_eq!(ids, vec![BASE_TX_ID + 2, BASE_TX_ID + 1]);
    Ok(())
}

#[test]
fn test_recovery_across_rotated_segments() -> Result<()> {
    let (layout, _temp_dir) = temp_layout()?;
    let mut config = DatabaseConfig::default();
    config.transaction_log.rotation_threshold = 1;
    {
        let db = GraphDatabase::builder(layout.clone()).config(config.clone()).start();
        commit_transactions(&db, 5)?;
    }
    assert_eq!(transaction_logs(&layout, &config).versions()?, vec![0, 1, 2, 3, 4]);

    let monitor = RecordingMonitor::new();
    let db = GraphDatabase::builder(layout.clone())
        .config(config.clone())
        .monitor(monitor.clone())
        .start();
    assert_eq!(db.state(), DatabaseState::Available);
    assert_eq!(*monitor.reverse_completed.lock(), vec![BASE_TX_ID + 1]);
    assert_eq!(monitor.recovered_transactions.lock().len(), 5);
    assert_eq!(db.last_committed_tx_id(), Some(BASE_TX_ID + 5));
    db.shutdown()?;

    let checkpoints = reachable_checkpoints(&layout, &config)?;
    assert_eq!(checkpoints.last().map(|c| c.transaction_log_position.log_version), Some(4));
    Ok(())
}
