use super::{MapSizeConfig, SyncMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the append-only block ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Backing file of the ledger (opened without a subdirectory)
    pub path: PathBuf,

    /// Sync mode for commits (default: asynchronous map flush)
    #[serde(default = "default_sync_mode")]
    pub sync_mode: SyncMode,

    /// Memory map sizing
    #[serde(default)]
    pub map: MapSizeConfig,

    /// Pushed blocks held in one write transaction before it is committed
    /// and flushed (default: 10,000)
    ///
    /// Block payloads are large, so this is much smaller than the generic
    /// store's threshold. It also bounds how many blocks a crash can lose.
    #[serde(default = "default_max_dirty")]
    pub max_dirty: usize,
}

fn default_sync_mode() -> SyncMode {
    SyncMode::MapAsync
}

fn default_max_dirty() -> usize {
    10_000
}

impl LedgerConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_mode: default_sync_mode(),
            map: MapSizeConfig::default(),
            max_dirty: default_max_dirty(),
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_map(mut self, map: MapSizeConfig) -> Self {
        self.map = map;
        self
    }

    pub fn with_max_dirty(mut self, max_dirty: usize) -> Self {
        self.max_dirty = max_dirty;
        self
    }
}
