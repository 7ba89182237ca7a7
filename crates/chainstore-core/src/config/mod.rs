pub mod database;
pub mod ledger;

pub use database::DataBaseConfig;
pub use ledger::LedgerConfig;

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

const MIB: usize = 1024 * 1024;
const GIB: usize = 1024 * MIB;

/// Durability mode of an environment.
///
/// Commits are never the durability point in the relaxed modes; the stores
/// flush explicitly once their dirty counter crosses its threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// `fsync()` on every commit.
    Full,

    /// Skip syncing the meta page on commit. The last transaction may be lost
    /// on an OS crash but the file stays consistent.
    NoMetaSync,

    /// Flush the write map asynchronously on commit (the block ledger default).
    MapAsync,

    /// No sync on commit at all; only explicit flushes reach stable storage
    /// (the generic store default).
    #[default]
    NoSync,
}

/// Sizing policy for the memory map.
///
/// The map is grown by `growth_bytes` whenever the space left between the last
/// allocated page and the end of the map drops to `min_free_bytes` or below.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MapSizeConfig {
    /// Map size used when the backing file is empty (default: 512 MiB)
    #[serde(default = "default_initial_map")]
    pub initial_bytes: usize,

    /// Safety margin that triggers growth (default: 512 MiB)
    #[serde(default = "default_min_free")]
    pub min_free_bytes: usize,

    /// Fixed growth increment (default: 1 GiB)
    #[serde(default = "default_growth")]
    pub growth_bytes: usize,
}

impl Default for MapSizeConfig {
    fn default() -> Self {
        Self {
            initial_bytes: default_initial_map(),
            min_free_bytes: default_min_free(),
            growth_bytes: default_growth(),
        }
    }
}

impl MapSizeConfig {
    pub fn new(initial_bytes: usize, min_free_bytes: usize, growth_bytes: usize) -> Self {
        Self {
            initial_bytes,
            min_free_bytes,
            growth_bytes,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_bytes == 0 {
            return Err(StoreError::Config("initial map size must be non-zero".into()));
        }
        if self.growth_bytes == 0 {
            return Err(StoreError::Config("map growth increment must be non-zero".into()));
        }
        Ok(())
    }

    /// Map size to open a backing file of `file_size` bytes with.
    pub fn initial_for_file(&self, file_size: u64) -> usize {
        if file_size == 0 {
            self.initial_bytes
        } else {
            file_size as usize
        }
    }
}

fn default_initial_map() -> usize {
    512 * MIB
}

fn default_min_free() -> usize {
    512 * MIB
}

fn default_growth() -> usize {
    GIB
}
