// BayunGraph Database Layout
//
// File naming for one database: record stores, their id files, the
// metadata store and the log directories.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::common::config::DatabaseConfig;

/// The record stores that make up a graph store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreType {
    Node,
    Relationship,
    Property,
    Schema,
}

impl StoreType {
    /// All store types, in the order they are opened
    pub const ALL: [StoreType; 4] = [
        StoreType::Node,
        StoreType::Relationship,
        StoreType::Property,
        StoreType::Schema,
    ];

    /// File name of the store
    pub fn file_name(&self) -> &'static str {
        match self {
            StoreType::Node => "neostore.nodestore.db",
            StoreType::Relationship => "neostore.relationshipstore.db",
            StoreType::Property => "neostore.propertystore.db",
            StoreType::Schema => "neostore.schemastore.db",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreType::Node => "node",
            StoreType::Relationship => "relationship",
            StoreType::Property => "property",
            StoreType::Schema => "schema",
        };
        f.write_str(name)
    }
}

/// Locations of every file belonging to one database
#[derive(Debug, Clone)]
pub struct DatabaseLayout {
    database_dir: PathBuf,
    transaction_logs_dir: PathBuf,
}

impl DatabaseLayout {
    pub const METADATA_STORE_NAME: &'static str = "neostore";
    pub const ID_FILE_SUFFIX: &'static str = ".id";

    /// Layout keeping the transaction logs next to the store files
    pub fn new(database_dir: impl Into<PathBuf>) -> Self {
        let database_dir = database_dir.into();
        Self {
            transaction_logs_dir: database_dir.clone(),
            database_dir,
        }
    }

    /// Layout with a separate transaction log directory
    pub fn with_transaction_logs_dir(database_dir: impl Into<PathBuf>, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_dir: database_dir.into(),
            transaction_logs_dir: logs_dir.into(),
        }
    }

    pub fn database_dir(&self) -> &Path {
        &self.database_dir
    }

    pub fn transaction_logs_dir(&self) -> &Path {
        &self.transaction_logs_dir
    }

    pub fn store_file(&self, store_type: StoreType) -> PathBuf {
        self.database_dir.join(store_type.file_name())
    }

    pub fn id_file(&self, store_type: StoreType) -> PathBuf {
        self.database_dir
            .join(format!("{}{}", store_type.file_name(), Self::ID_FILE_SUFFIX))
    }

    pub fn metadata_store(&self) -> PathBuf {
        self.database_dir.join(Self::METADATA_STORE_NAME)
    }

    /// Store files that recovery needs random access to, metadata store first
    pub fn store_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.metadata_store()];
        files.extend(StoreType::ALL.iter().map(|t| self.store_file(*t)));
        files
    }

    pub fn id_files(&self) -> Vec<PathBuf> {
        StoreType::ALL.iter().map(|t| self.id_file(*t)).collect()
    }

    /// Directory of transaction log segments for the given configuration
    pub fn transaction_log_base(&self, config: &DatabaseConfig) -> (PathBuf, String) {
        (
            self.transaction_logs_dir.clone(),
            config.transaction_log.log_file_base_name.clone(),
        )
    }

    /// Directory and base name of checkpoint log segments
    pub fn checkpoint_log_base(&self, config: &DatabaseConfig) -> (PathBuf, String) {
        (
            self.transaction_logs_dir.clone(),
            config.checkpoint.checkpoint_file_base_name.clone(),
        )
    }
}
