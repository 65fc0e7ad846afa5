// BayunGraph Storage Module
//
// Record stores, id generators and the metadata store, all reached through
// the page cache.

pub mod disk;
pub mod page_cache;
pub mod error;
pub mod layout;
pub mod record;
pub mod record_store;
pub mod id;
pub mod metadata;
pub mod neo_stores;

// Public exports
pub use error::{Result, StoreError};
pub use layout::{DatabaseLayout, StoreType};
pub use page_cache::{PageCache, PageCacheTracer, Tracers};
pub use metadata::{MetaDataPosition, MetaDataStore};
pub use neo_stores::{ApplyOutcome, NeoStores, StoreFileOracle};
