// BayunGraph Id Generators
//
// One id generator per record store.

pub mod error;
pub mod id_generator;

use std::collections::BTreeMap;

use crate::storage::layout::{DatabaseLayout, StoreType};

pub use error::{IdError, Result};
pub use id_generator::{IdFileState, IdGenerator, IdMarker};

/// The open id generators of a database
pub struct IdGenerators {
    generators: BTreeMap<StoreType, IdGenerator>,
}

impl IdGenerators {
    /// Open the id generator of every store. Fails on the first missing file.
    pub fn open_all(layout: &DatabaseLayout) -> Result<Self> {
        let mut generators = BTreeMap::new();
        for store_type in StoreType::ALL {
            let generator = IdGenerator::open(&layout.id_file(store_type), store_type)?;
            generators.insert(store_type, generator);
        }
        Ok(Self { generators })
    }

    /// Create a clean, empty id file for every store
    pub fn create_all(layout: &DatabaseLayout) -> Result<()> {
        for store_type in StoreType::ALL {
            IdGenerator::create(&layout.id_file(store_type), 0, [])?;
        }
        Ok(())
    }

    /// Read-only look at every id file
    pub fn probe_all(layout: &DatabaseLayout) -> Result<Vec<(StoreType, IdFileState)>> {
        StoreType::ALL
            .iter()
            .map(|t| Ok((*t, IdGenerator::probe(&layout.id_file(*t))?)))
            .collect()
    }

    pub fn from_generators(generators: impl IntoIterator<Item = IdGenerator>) -> Self {
        Self {
            generators: generators.into_iter().map(|g| (g.store_type(), g)).collect(),
        }
    }

    pub fn get(&self, store_type: StoreType) -> Result<&IdGenerator> {
        self.generators.get(&store_type).ok_or(IdError::NotOpen(store_type))
    }

    pub fn get_mut(&mut self, store_type: StoreType) -> Result<&mut IdGenerator> {
        self.generators.get_mut(&store_type).ok_or(IdError::NotOpen(store_type))
    }

    /// Store types whose generator was dirty when opened
    pub fn dirty_on_startup(&self) -> Vec<StoreType> {
        self.generators
            .values()
            .filter(|g| g.dirty_on_startup())
            .map(|g| g.store_type())
            .collect()
    }

    pub fn checkpoint_all(&mut self) -> Result<()> {
        for generator in self.generators.values_mut() {
            generator.checkpoint()?;
        }
        Ok(())
    }

    /// Close every generator cleanly
    pub fn close_all(self) -> Result<()> {
        for (_, generator) in self.generators {
            generator.close()?;
        }
        Ok(())
    }
}
