// BayunGraph Index Rebuild Scheduling
//
// Index commands seen during replay only mark their index. The marked
// indexes are handed to the populator once, after replay.

use std::collections::BTreeSet;
use parking_lot::Mutex;
use log::info;

use crate::storage::record::IndexDescriptor;

/// Trigger for index population
pub trait IndexPopulator: Send + Sync {
    fn schedule_rebuild(&self, descriptor: IndexDescriptor);
}

/// Populator that only records what it was asked to rebuild
#[derive(Debug, Default)]
pub struct RecordingIndexPopulator {
    scheduled: Mutex<Vec<IndexDescriptor>>,
}

impl RecordingIndexPopulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<IndexDescriptor> {
        self.scheduled.lock().clone()
    }
}

impl IndexPopulator for RecordingIndexPopulator {
    fn schedule_rebuild(&self, descriptor: IndexDescriptor) {
        self.scheduled.lock().push(descriptor);
    }
}

/// Deduplicated set of indexes to rebuild
#[derive(Debug, Default)]
pub struct IndexRebuildSchedule {
    descriptors: BTreeSet<IndexDescriptor>,
}

impl IndexRebuildSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, descriptor: IndexDescriptor) {
        self.descriptors.insert(descriptor);
    }

    /// Forget an index that was dropped later in the log
    pub fn unmark(&mut self, schema_id: u64) {
        self.descriptors.retain(|d| d.schema_id != schema_id);
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &IndexDescriptor> {
        self.descriptors.iter()
    }

    /// Hand every marked index to the populator and clear the schedule
    pub fn schedule_all(&mut self, populator: &dyn IndexPopulator) -> usize {
        let descriptors = std::mem::take(&mut self.descriptors);
        if !descriptors.is_empty() {
            info!("Scheduling population of {} indexes", descriptors.len());
        }
        for descriptor in &descriptors {
            populator.schedule_rebuild(*descriptor);
        }
        descriptors.len()
    }
}
