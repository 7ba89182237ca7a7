use chainstore_core::{
    error::{Result, StoreError},
    observe,
    traits::MainChainStorage,
    types::{BlockIndex, RawBlock},
    LedgerConfig,
};
use lmdb::{Environment, EnvironmentFlags};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use std::time::Instant;

use crate::engine::{self, engine_err, MapInfo};
use crate::keys::{height_to_key, key_to_height};
use crate::resize::{
    check_resize, check_resize_for, grow_after_map_full, MapGrowth, ResizeOutcome,
};
use crate::snapshot::Snapshot;
use crate::txn::WriteHandle;

const STORE: &str = "ledger";

/// Ledger counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStats {
    pub block_count: BlockIndex,
    /// Blocks already committed to the table
    pub committed: BlockIndex,
    /// Pushed blocks waiting for the next commit
    pub pending: usize,
    pub map: MapInfo,
}

/// Append-only, densely indexed block ledger on LMDB
///
/// Block `i` is stored under the big-endian height key `i` as its canonical
/// JSON record. Pushes are buffered and committed together in one write
/// transaction once `max_dirty` of them have accumulated (the first block of
/// an empty ledger is committed right away). Buffered blocks are readable
/// and count towards [`MainChainStorage::get_block_count`].
pub struct LmdbMainChainStorage {
    env: Environment,
    db: lmdb::Database,
    path: PathBuf,
    growth: MapGrowth,
    max_dirty: usize,
    block_count: BlockIndex,
    pending: Vec<Vec<u8>>,
    live_snapshots: AtomicUsize,
}

impl LmdbMainChainStorage {
    pub fn open(config: LedgerConfig) -> Result<Self> {
        config.map.validate()?;

        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file_size = engine::ensure_backing_file(&config.path)?;
        let map_size = config.map.initial_for_file(file_size);
        let env = engine::open_environment(
            &config.path,
            engine::env_flags(config.sync_mode) | EnvironmentFlags::NO_SUB_DIR,
            map_size,
        )?;
        let db = env.open_db(None).map_err(engine_err)?;

        let live_snapshots = AtomicUsize::new(0);
        let block_count = committed_block_count(&env, db, &live_snapshots)?;

        let storage = Self {
            env,
            db,
            path: config.path,
            growth: MapGrowth::from_config(&config.map),
            max_dirty: config.max_dirty.max(1),
            block_count,
            pending: Vec::new(),
            live_snapshots,
        };
        storage.resize_best_effort();
        observe::set_block_count(block_count);

        tracing::info!(
            "Opened main chain storage at {} with {} blocks",
            storage.path.display(),
            block_count
        );
        Ok(storage)
    }

    /// Backing file of the ledger
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        Ok(LedgerStats {
            block_count: self.block_count,
            committed: self.committed_count(),
            pending: self.pending.len(),
            map: engine::map_info(&self.env)?,
        })
    }

    /// Commit buffered pushes and flush them to stable storage
    ///
    /// The map is grown ahead of the commit to fit the buffered bytes, and
    /// again whenever the engine still reports it full. On error nothing was
    /// committed and the buffer is left untouched.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let first = self.committed_count();
        let incoming = self.pending.iter().map(Vec::len).sum();
        if let Err(e) =
            check_resize_for(&self.env, &self.growth, &self.live_snapshots, STORE, incoming)
        {
            tracing::warn!("Ledger resize check failed before commit: {}", e);
        }

        loop {
            match self.commit_pending(first) {
                Ok(()) => break,
                Err(StoreError::MapFull) => {
                    match grow_after_map_full(&self.env, &self.growth, &self.live_snapshots, STORE)?
                    {
                        ResizeOutcome::Grown { .. } => continue,
                        _ => return Err(StoreError::MapFull),
                    }
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(
            "Committed blocks {}..{} to main chain storage",
            first,
            self.block_count
        );
        self.pending.clear();

        // Committed from here on; a failed sync is caught up by the next one
        if let Err(e) = self.env.sync(true) {
            tracing::error!("Failed to sync main chain storage: {}", e);
        }
        observe::record_flush(STORE, started.elapsed());
        self.resize_best_effort();
        Ok(())
    }

    /// Write every buffered block from height `first` in one transaction
    fn commit_pending(&self, first: BlockIndex) -> Result<()> {
        let mut handle = WriteHandle::begin(&self.env, self.db)?;
        for (offset, record) in self.pending.iter().enumerate() {
            handle.put(&height_to_key(first + offset as BlockIndex), record)?;
        }
        handle.commit(STORE).map(|_| ())
    }

    fn committed_count(&self) -> BlockIndex {
        self.block_count - self.pending.len() as BlockIndex
    }

    fn resize_best_effort(&self) {
        if let Err(e) = check_resize(&self.env, &self.growth, &self.live_snapshots, STORE) {
            tracing::warn!("Ledger resize check failed, retrying on next write: {}", e);
        }
    }
}

/// Count committed blocks, checking that the keys are dense
fn committed_block_count(
    env: &Environment,
    db: lmdb::Database,
    live: &AtomicUsize,
) -> Result<BlockIndex> {
    let entries = engine::map_info(env)?.entries;
    if entries == 0 {
        return Ok(0);
    }

    let count = BlockIndex::try_from(entries).map_err(|_| {
        StoreError::InvalidState(format!("main chain storage holds {entries} entries"))
    })?;
    let snapshot = Snapshot::open(env, db, live)?;
    let last = snapshot.last_key()?.as_deref().and_then(key_to_height);
    if last != Some(count - 1) {
        tracing::error!(
            "Main chain storage is not densely indexed: {} entries, last key {:?}",
            count,
            last
        );
        return Err(StoreError::InvalidState(format!(
            "expected last block {} but found {:?}",
            count - 1,
            last
        )));
    }
    Ok(count)
}

fn decode(index: BlockIndex, bytes: &[u8]) -> Result<RawBlock> {
    RawBlock::from_canonical_json(bytes).map_err(|e| {
        tracing::error!("Failed to parse block {}: {}", index, e);
        StoreError::CorruptBlock {
            index,
            reason: e.to_string(),
        }
    })
}

impl MainChainStorage for LmdbMainChainStorage {
    fn push_block(&mut self, raw_block: &RawBlock) -> Result<()> {
        if self.block_count == BlockIndex::MAX {
            return Err(StoreError::InvalidState("block count overflow".into()));
        }
        let record = raw_block.to_canonical_json()?;
        self.pending.push(record);
        self.block_count += 1;

        if self.block_count == 1 || self.pending.len() >= self.max_dirty {
            if let Err(e) = self.flush() {
                // Nothing was committed; drop this block and keep earlier ones buffered
                self.pending.pop();
                self.block_count -= 1;
                return Err(e);
            }
        }
        observe::set_block_count(self.block_count);
        Ok(())
    }

    fn pop_block(&mut self) -> Result<()> {
        if self.block_count == 0 {
            tracing::debug!("Pop on empty main chain storage");
            return Ok(());
        }
        if self.pending.pop().is_some() {
            self.block_count -= 1;
            observe::set_block_count(self.block_count);
            return Ok(());
        }

        let tip = self.block_count - 1;
        let mut handle = WriteHandle::begin(&self.env, self.db)?;
        let removed = handle.delete_last()?;
        if removed.as_deref().and_then(key_to_height) != Some(tip) {
            return Err(StoreError::InvalidState(format!(
                "expected to remove block {tip} but the last key was {removed:?}"
            )));
        }
        handle.commit(STORE)?;

        self.block_count = tip;
        observe::set_block_count(self.block_count);
        Ok(())
    }

    fn get_block_by_index(&self, index: BlockIndex) -> Result<RawBlock> {
        if index >= self.block_count {
            return Err(StoreError::BlockNotFound(index));
        }

        let committed = self.committed_count();
        if index >= committed {
            return decode(index, &self.pending[(index - committed) as usize]);
        }

        let snapshot = Snapshot::open(&self.env, self.db, &self.live_snapshots)?;
        match snapshot.get(&height_to_key(index))? {
            Some(bytes) => decode(index, &bytes),
            None => {
                tracing::warn!(
                    "Block {} missing below block count {}",
                    index,
                    self.block_count
                );
                Err(StoreError::BlockNotFound(index))
            }
        }
    }

    fn get_block_count(&self) -> BlockIndex {
        self.block_count
    }

    fn clear(&mut self) -> Result<()> {
        Err(StoreError::Unsupported("clearing the main chain storage"))
    }
}

impl Drop for LmdbMainChainStorage {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!(
                "Failed to commit {} pending blocks on close: {}",
                self.pending.len(),
                e
            );
        }
        if let Err(e) = self.env.sync(true) {
            tracing::error!("Failed to sync main chain storage on close: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainstore_core::MapSizeConfig;

    fn config(path: &Path) -> LedgerConfig {
        LedgerConfig::new(path).with_map(MapSizeConfig::new(4 << 20, 1 << 20, 4 << 20))
    }

    fn block(tag: u8) -> RawBlock {
        RawBlock::new(vec![tag; 4]).with_transactions(vec![vec![tag]])
    }

    #[test]
    fn test_corrupt_record_is_not_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.lmdb");
        {
            let mut storage = LmdbMainChainStorage::open(config(&path)).unwrap();
            storage.push_block(&block(0)).unwrap();

            let mut handle = WriteHandle::begin(&storage.env, storage.db).unwrap();
            handle.put(&height_to_key(1), b"not json").unwrap();
            handle.commit(STORE).unwrap();
        }

        let storage = LmdbMainChainStorage::open(config(&path)).unwrap();
        assert_eq!(storage.get_block_count(), 2);
        assert!(matches!(
            storage.get_block_by_index(1),
            Err(StoreError::CorruptBlock { index: 1, .. })
        ));
        assert_eq!(storage.get_block_by_index(0).unwrap(), block(0));
    }

    #[test]
    fn test_sparse_keys_rejected_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.lmdb");
        {
            let storage = LmdbMainChainStorage::open(config(&path)).unwrap();
            let record = block(5).to_canonical_json().unwrap();
            let mut handle = WriteHandle::begin(&storage.env, storage.db).unwrap();
            handle.put(&height_to_key(5), &record).unwrap();
            handle.commit(STORE).unwrap();
        }

        assert!(matches!(
            LmdbMainChainStorage::open(config(&path)),
            Err(StoreError::InvalidState(_))
        ));
    }

    #[test]
    fn test_pop_discards_pending_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.lmdb");
        let mut storage = LmdbMainChainStorage::open(config(&path).with_max_dirty(100)).unwrap();

        storage.push_block(&block(0)).unwrap();
        storage.push_block(&block(1)).unwrap();
        assert_eq!(storage.stats().unwrap().pending, 1);

        storage.pop_block().unwrap();
        let stats = storage.stats().unwrap();
        assert_eq!((stats.block_count, stats.committed, stats.pending), (1, 1, 0));

        storage.pop_block().unwrap();
        assert_eq!(storage.get_block_count(), 0);
        assert_eq!(storage.stats().unwrap().map.entries, 0);
    }

    #[test]
    fn test_full_map_grown_and_commit_retried() {
        const MIB: usize = 1024 * 1024;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.lmdb");
        // No floor, so only a failed commit makes the map grow
        let config = LedgerConfig::new(&path)
            .with_map(MapSizeConfig::new(MIB, 0, MIB))
            .with_max_dirty(1000);
        let mut storage = LmdbMainChainStorage::open(config).unwrap();
        storage.push_block(&block(0)).unwrap();

        // Each record is about 32 KiB once hex encoded
        let large = |tag: u8| RawBlock::new(vec![tag; 16 * 1024]);
        for tag in 1..=40 {
            storage.push_block(&large(tag)).unwrap();
        }
        assert!(matches!(storage.commit_pending(1), Err(StoreError::MapFull)));
        assert_eq!(storage.stats().unwrap().map.entries, 1);

        storage.flush().unwrap();
        let stats = storage.stats().unwrap();
        assert_eq!((stats.committed, stats.pending, stats.map.entries), (41, 0, 41));
        assert!(stats.map.map_size > MIB);
        assert_eq!(storage.get_block_by_index(40).unwrap(), large(40));
    }
}
