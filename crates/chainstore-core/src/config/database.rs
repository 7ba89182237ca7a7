use super::{MapSizeConfig, SyncMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name of the production database under the data directory
pub const DB_NAME: &str = "DB";

/// Directory name of the test-network database under the data directory
pub const TESTNET_DB_NAME: &str = "testnet_DB";

/// Backing file of the generic store inside its directory
pub const DB_FILE_NAME: &str = "data.mdb";

/// Configuration for the generic transactional store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataBaseConfig {
    /// Node data directory; the database lives in a subdirectory of it
    pub data_dir: PathBuf,

    /// Use the test-network subdirectory instead of the production one
    #[serde(default)]
    pub testnet: bool,

    /// Sync mode for commits (default: no sync, explicit flushes only)
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Memory map sizing
    #[serde(default)]
    pub map: MapSizeConfig,

    /// Mutations allowed between two explicit flushes (default: 200,000)
    #[serde(default = "default_max_dirty")]
    pub max_dirty: u64,

    /// Operations applied in one write transaction before it is committed
    /// and a fresh one opened (default: 300)
    #[serde(default = "default_max_txn_ops")]
    pub max_txn_ops: usize,
}

fn default_max_dirty() -> u64 {
    200_000
}

fn default_max_txn_ops() -> usize {
    300
}

impl DataBaseConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            testnet: false,
            sync_mode: SyncMode::default(),
            map: MapSizeConfig::default(),
            max_dirty: default_max_dirty(),
            max_txn_ops: default_max_txn_ops(),
        }
    }

    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_map(mut self, map: MapSizeConfig) -> Self {
        self.map = map;
        self
    }

    pub fn with_max_dirty(mut self, max_dirty: u64) -> Self {
        self.max_dirty = max_dirty;
        self
    }

    pub fn with_max_txn_ops(mut self, max_txn_ops: usize) -> Self {
        self.max_txn_ops = max_txn_ops;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Database directory: `<data_dir>/DB` or `<data_dir>/testnet_DB`
    pub fn db_dir(&self) -> PathBuf {
        if self.testnet {
            self.data_dir.join(TESTNET_DB_NAME)
        } else {
            self.data_dir.join(DB_NAME)
        }
    }

    pub fn db_file(&self) -> PathBuf {
        self.db_dir().join(DB_FILE_NAME)
    }
}
