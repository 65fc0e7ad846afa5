// BayunGraph Neo Stores
//
// The set of record stores of one database, and the low-level apply path
// shared by transaction commit and recovery.

use std::path::{Path, PathBuf};
use log::debug;

use crate::common::types::RecordId;
use crate::storage::error::Result;
use crate::storage::layout::{DatabaseLayout, StoreType};
use crate::storage::page_cache::PageCache;
use crate::storage::record::{NodeRecord, PropertyRecord, Record, RelationshipRecord, SchemaRecord};
use crate::storage::record_store::RecordStore;
use crate::transaction::log::log_entry::Command;

/// Result of applying one command to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The store was changed
    Applied,
    /// The store already held the command's after-image
    AlreadyApplied,
}

/// Store-file presence and high-id lookups used by recovery
pub trait StoreFileOracle {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// One past the highest in-use record of the store
    fn high_id(&self, store_type: StoreType) -> Result<u64>;

    /// In-use record ids of the store below `high_id`
    fn in_use_ids(&self, store_type: StoreType, high_id: u64) -> Result<Vec<RecordId>>;
}

/// Store files that are missing from the layout, metadata store first
pub fn missing_store_files(layout: &DatabaseLayout) -> Vec<PathBuf> {
    layout.store_files().into_iter().filter(|p| !p.exists()).collect()
}

/// All record stores of a database
pub struct NeoStores {
    nodes: RecordStore<NodeRecord>,
    relationships: RecordStore<RelationshipRecord>,
    properties: RecordStore<PropertyRecord>,
    schema: RecordStore<SchemaRecord>,
}

impl NeoStores {
    /// Open existing store files
    pub fn open(layout: &DatabaseLayout, page_cache: &PageCache) -> Result<Self> {
        Self::open_stores(layout, page_cache, false)
    }

    /// Create store files for a new database
    pub fn create(layout: &DatabaseLayout, page_cache: &PageCache) -> Result<Self> {
        Self::open_stores(layout, page_cache, true)
    }

    fn open_stores(layout: &DatabaseLayout, page_cache: &PageCache, create: bool) -> Result<Self> {
        Ok(Self {
            nodes: RecordStore::open(page_cache, &layout.store_file(StoreType::Node), create)?,
            relationships: RecordStore::open(page_cache, &layout.store_file(StoreType::Relationship), create)?,
            properties: RecordStore::open(page_cache, &layout.store_file(StoreType::Property), create)?,
            schema: RecordStore::open(page_cache, &layout.store_file(StoreType::Schema), create)?,
        })
    }

    pub fn nodes(&self) -> &RecordStore<NodeRecord> {
        &self.nodes
    }

    pub fn relationships(&self) -> &RecordStore<RelationshipRecord> {
        &self.relationships
    }

    pub fn properties(&self) -> &RecordStore<PropertyRecord> {
        &self.properties
    }

    pub fn schema(&self) -> &RecordStore<SchemaRecord> {
        &self.schema
    }

    /// Apply a command's after-image. Applying a command the store already
    /// reflects is a no-op.
    pub fn apply(&self, command: &Command) -> Result<ApplyOutcome> {
        match command {
            Command::Node(record) => apply_record(&self.nodes, record),
            Command::Relationship(record) => apply_record(&self.relationships, record),
            Command::Property(record) => apply_record(&self.properties, record),
            Command::Schema(record) => apply_record(&self.schema, record),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.nodes.flush()?;
        self.relationships.flush()?;
        self.properties.flush()?;
        self.schema.flush()?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.nodes.close()?;
        self.relationships.close()?;
        self.properties.close()?;
        self.schema.close()?;
        Ok(())
    }
}

fn apply_record<R: Record>(store: &RecordStore<R>, record: &R) -> Result<ApplyOutcome> {
    let current = store.get_record(record.id())?;
    if current == *record {
        debug!("{} record {} already applied", R::STORE_TYPE, record.id());
        return Ok(ApplyOutcome::AlreadyApplied);
    }
    store.update_record(record)?;
    Ok(ApplyOutcome::Applied)
}

impl StoreFileOracle for NeoStores {
    fn high_id(&self, store_type: StoreType) -> Result<u64> {
        match store_type {
            StoreType::Node => self.nodes.high_id(),
            StoreType::Relationship => self.relationships.high_id(),
            StoreType::Property => self.properties.high_id(),
            StoreType::Schema => self.schema.high_id(),
        }
    }

    fn in_use_ids(&self, store_type: StoreType, high_id: u64) -> Result<Vec<RecordId>> {
        match store_type {
            StoreType::Node => self.nodes.in_use_ids(high_id),
            StoreType::Relationship => self.relationships.in_use_ids(high_id),
            StoreType::Property => self.properties.in_use_ids(high_id),
            StoreType::Schema => self.schema.in_use_ids(high_id),
        }
    }
}
