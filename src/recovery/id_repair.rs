// BayunGraph Id Generator Repair
//
// Id files can always be derived from their store: missing or unreadable
// ones are regenerated and dirty ones rebuilt from the store's in-use
// records.

use log::{info, warn};

use crate::common::types::current_time_millis;
use crate::storage::id::{IdFileState, IdGenerator, IdGenerators};
use crate::storage::layout::{DatabaseLayout, StoreType};
use crate::storage::metadata::{MetaDataPosition, MetaDataStore};
use crate::storage::neo_stores::StoreFileOracle;
use super::error::Result;
use super::monitor::{Monitors, RecoveryMonitor};

/// Write a clean id file for every store whose id file is missing or
/// unreadable. Records the time of the repair in the metadata store.
pub fn regenerate_missing_id_files(
    layout: &DatabaseLayout,
    stores: &impl StoreFileOracle,
    monitors: &Monitors,
) -> Result<Vec<StoreType>> {
    let missing: Vec<(StoreType, IdFileState)> = IdGenerators::probe_all(layout)?
        .into_iter()
        .filter(|(_, state)| matches!(state, IdFileState::Missing | IdFileState::Corrupt))
        .collect();
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let mut regenerated = Vec::with_capacity(missing.len());
    for (store_type, state) in missing {
        let path = layout.id_file(store_type);
        warn!("Id file {:?} is {:?}, regenerating it from the {} store", path, state, store_type);
        let high_id = stores.high_id(store_type)?;
        let in_use = stores.in_use_ids(store_type, high_id)?;
        let free = (0..high_id).filter(|id| in_use.binary_search(id).is_err());
        IdGenerator::create(&path, high_id, free)?;
        monitors.id_generator_rebuilt(store_type);
        regenerated.push(store_type);
    }

    MetaDataStore::set_record(
        &layout.metadata_store(),
        MetaDataPosition::LastMissingStoreFilesRecoveryTimestamp,
        current_time_millis() as i64,
    )?;
    Ok(regenerated)
}

/// Rebuild the given generators from their stores
pub fn rebuild_id_generators(
    id_generators: &mut IdGenerators,
    stores: &impl StoreFileOracle,
    store_types: &[StoreType],
    monitors: &Monitors,
) -> Result<()> {
    for store_type in store_types {
        let high_id = stores.high_id(*store_type)?;
        let in_use = stores.in_use_ids(*store_type, high_id)?;
        id_generators.get_mut(*store_type)?.rebuild(high_id, &in_use);
        info!("Rebuilt {} id generator: high id {}", store_type, high_id);
        monitors.id_generator_rebuilt(*store_type);
    }
    Ok(())
}
