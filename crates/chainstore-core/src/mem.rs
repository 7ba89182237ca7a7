//! In-memory storage backends for testing.
//!
//! Both types honour the same contracts as the LMDB backends (lifecycle
//! errors, negative lookups, insert-then-remove ordering, dense tip removal)
//! so node components can be tested without touching the filesystem.

use crate::config::DataBaseConfig;
use crate::error::{Result, StoreError};
use crate::traits::{Database, MainChainStorage};
use crate::types::{BlockIndex, RawBlock, ReadBatch, ReadResult, WriteBatch};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory [`Database`] backed by a `BTreeMap`.
///
/// Contents survive `shutdown`/`init` cycles of the same instance, like a
/// database directory on disk would.
#[derive(Debug, Default)]
pub struct MemDatabase {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    initialized: bool,
}

impl MemDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }
}

impl Database for MemDatabase {
    fn init(&mut self, _config: &DataBaseConfig) -> Result<()> {
        if self.initialized {
            return Err(StoreError::AlreadyInitialized);
        }
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.initialized = false;
        Ok(())
    }

    fn destroy(&mut self, _config: &DataBaseConfig) -> Result<()> {
        if self.initialized {
            return Err(StoreError::AlreadyInitialized);
        }
        tracing::debug!("Destroying in-memory DB with {} keys", self.len());
        self.data.write().clear();
        Ok(())
    }

    fn write(&self, batch: &mut dyn WriteBatch) -> Result<()> {
        self.ensure_initialized()?;
        let inserts = batch.extract_raw_data_to_insert();
        let removals = batch.extract_raw_keys_to_remove();

        let mut data = self.data.write();
        for (key, value) in inserts {
            data.insert(key, value);
        }
        for key in removals {
            if data.remove(&key).is_none() {
                tracing::trace!("Key to remove is absent");
            }
        }
        Ok(())
    }

    fn read(&self, batch: &mut dyn ReadBatch) -> Result<()> {
        self.ensure_initialized()?;
        let data = self.data.read();
        let results = batch
            .raw_keys()
            .iter()
            .map(|key| match data.get(key) {
                Some(value) => ReadResult::found(value.clone()),
                None => ReadResult::missing(),
            })
            .collect();
        batch.submit_raw_result(results);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// In-memory [`MainChainStorage`] backed by a `Vec`.
#[derive(Debug, Clone, Default)]
pub struct MemChainStorage {
    blocks: Vec<RawBlock>,
}

impl MemChainStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain seeded with a genesis block, as the bootstrap helper would leave it
    pub fn with_genesis(genesis: RawBlock) -> Self {
        Self {
            blocks: vec![genesis],
        }
    }
}

impl MainChainStorage for MemChainStorage {
    fn push_block(&mut self, raw_block: &RawBlock) -> Result<()> {
        if self.blocks.len() >= BlockIndex::MAX as usize {
            return Err(StoreError::InvalidState("block count overflow".into()));
        }
        self.blocks.push(raw_block.clone());
        Ok(())
    }

    fn pop_block(&mut self) -> Result<()> {
        self.blocks.pop();
        Ok(())
    }

    fn get_block_by_index(&self, index: BlockIndex) -> Result<RawBlock> {
        self.blocks
            .get(index as usize)
            .cloned()
            .ok_or(StoreError::BlockNotFound(index))
    }

    fn get_block_count(&self) -> BlockIndex {
        self.blocks.len() as BlockIndex
    }

    fn clear(&mut self) -> Result<()> {
        Err(StoreError::Unsupported("clearing the main chain storage"))
    }
}
