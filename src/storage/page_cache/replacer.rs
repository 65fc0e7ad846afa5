use std::collections::{BTreeMap, HashMap};
use crate::common::types::PageId;

/// Least-recently-used eviction order over the resident pages of one file.
/// Every access gets a fresh stamp; the page with the lowest stamp goes first.
pub struct EvictionOrder {
    clock: u64,
    by_stamp: BTreeMap<u64, PageId>,
    stamps: HashMap<PageId, u64>,
}

impl EvictionOrder {
    pub fn new(capacity: usize) -> Self {
        Self {
            clock: 0,
            by_stamp: BTreeMap::new(),
            stamps: HashMap::with_capacity(capacity),
        }
    }

    /// Mark `page_id` as the most recently used page
    pub fn touch(&mut self, page_id: PageId) {
        self.clock += 1;
        if let Some(previous) = self.stamps.insert(page_id, self.clock) {
            self.by_stamp.remove(&previous);
        }
        self.by_stamp.insert(self.clock, page_id);
    }

    /// Remove and return the least recently used page
    pub fn pop_oldest(&mut self) -> Option<PageId> {
        let (_, page_id) = self.by_stamp.pop_first()?;
        self.stamps.remove(&page_id);
        Some(page_id)
    }
}
