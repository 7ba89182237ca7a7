use chainstore_core::{
    error::{Result, StoreError},
    observe,
    traits::Database,
    types::{ReadBatch, ReadResult, WriteBatch},
    DataBaseConfig, SyncMode,
};
use lmdb::Environment;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use std::time::Instant;

use crate::engine::{self, engine_err, MapInfo};
use crate::resize::{
    check_resize, check_resize_for, grow_after_map_full, MapGrowth, ResizeOutcome,
};
use crate::snapshot::{RenewalOutcome, Snapshot};
use crate::txn::WriteHandle;

const STORE: &str = "database";

/// LMDB-backed generic key/value database
///
/// Writes are batched: each [`Database::write`] is applied in one or more
/// write transactions (split every `max_txn_ops` mutations) and the
/// environment is only flushed to disk once `max_dirty` mutations have
/// accumulated, or on [`LmdbDatabase::flush`] and shutdown.
#[derive(Default)]
pub struct LmdbDatabase {
    inner: Option<OpenDatabase>,
}

struct OpenDatabase {
    env: Environment,
    db: lmdb::Database,
    dir: PathBuf,
    growth: MapGrowth,
    max_dirty: u64,
    max_txn_ops: usize,
    writer: Mutex<WriterState>, // Single writer
    live_snapshots: AtomicUsize,
}

struct WriterState {
    dirty: u64,
}

impl LmdbDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and initialize in one step
    pub fn open(config: &DataBaseConfig) -> Result<Self> {
        let mut db = Self::new();
        db.init(config)?;
        Ok(db)
    }

    fn inner(&self) -> Result<&OpenDatabase> {
        self.inner.as_ref().ok_or(StoreError::NotInitialized)
    }

    /// Open a long-lived snapshot, to be used with [`LmdbDatabase::read_with`]
    pub fn snapshot(&self) -> Result<Snapshot<'_>> {
        let inner = self.inner()?;
        Snapshot::open(&inner.env, inner.db, &inner.live_snapshots)
    }

    /// Read through a caller-held snapshot
    ///
    /// The snapshot is renewed first, so the batch observes the latest
    /// committed data. The renewal outcome is returned; a snapshot that has
    /// failed to renew too often yields [`StoreError::SnapshotUnavailable`]
    /// and the batch is left unanswered.
    pub fn read_with(
        &self,
        snapshot: &mut Snapshot<'_>,
        batch: &mut dyn ReadBatch,
    ) -> Result<RenewalOutcome> {
        let inner = self.inner()?;
        if !snapshot.belongs_to(&inner.env) {
            return Err(StoreError::InvalidState(
                "snapshot was opened on a different database".into(),
            ));
        }
        let outcome = snapshot.renew();
        if outcome == RenewalOutcome::PersistentFailure {
            return Err(StoreError::SnapshotUnavailable(snapshot.failures()));
        }
        lookup(snapshot, batch)?;
        Ok(outcome)
    }

    /// Force dirty commits to stable storage
    pub fn flush(&self) -> Result<()> {
        let inner = self.inner()?;
        let mut writer = inner.writer.lock();
        inner.flush_locked(&mut writer)
    }

    /// Space accounting of the environment
    pub fn map_info(&self) -> Result<MapInfo> {
        engine::map_info(&self.inner()?.env)
    }

    /// Run the map growth check now
    ///
    /// Writes run it on their own; this is for callers that just released
    /// long-lived snapshots after a deferral.
    pub fn check_resize(&self) -> Result<ResizeOutcome> {
        let inner = self.inner()?;
        let _writer = inner.writer.lock();
        check_resize(&inner.env, &inner.growth, &inner.live_snapshots, STORE)
    }

    /// Committed mutations not yet flushed
    pub fn dirty(&self) -> Result<u64> {
        Ok(self.inner()?.writer.lock().dirty)
    }

    /// Directory holding the environment
    pub fn db_dir(&self) -> Option<&Path> {
        self.inner.as_ref().map(|inner| inner.dir.as_path())
    }
}

impl Database for LmdbDatabase {
    fn init(&mut self, config: &DataBaseConfig) -> Result<()> {
        if self.inner.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }
        config.map.validate()?;

        tracing::info!("Initializing DB using lmdb backend");
        let dir = config.db_dir();
        std::fs::create_dir_all(&dir).map_err(|e| {
            tracing::error!("Failed to create db directory {}: {}", dir.display(), e);
            StoreError::Io(e)
        })?;

        let file_size = engine::ensure_backing_file(&config.db_file())?;
        let map_size = config.map.initial_for_file(file_size);
        tracing::debug!("Initial DB mapsize: {} bytes", map_size);

        tracing::info!("Opening DB in {}", dir.display());
        let env = engine::open_environment(&dir, engine::env_flags(config.sync_mode), map_size)?;
        let db = env.open_db(None).map_err(engine_err)?;

        let inner = OpenDatabase {
            env,
            db,
            dir,
            growth: MapGrowth::from_config(&config.map),
            max_dirty: config.max_dirty,
            max_txn_ops: config.max_txn_ops.max(1),
            writer: Mutex::new(WriterState { dirty: 0 }),
            live_snapshots: AtomicUsize::new(0),
        };
        inner.resize_best_effort(0);
        self.inner = Some(inner);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        let inner = self.inner.take().ok_or(StoreError::NotInitialized)?;
        tracing::info!("Finalizing DB write");
        let result = {
            let mut writer = inner.writer.lock();
            inner.flush_locked(&mut writer)
        };
        tracing::info!("Closing DB");
        drop(inner);
        result
    }

    fn destroy(&mut self, config: &DataBaseConfig) -> Result<()> {
        if self.inner.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }
        let dir = config.db_dir();
        let file = config.db_file();
        if !file.exists() {
            tracing::debug!("No DB to destroy in {}", dir.display());
            return Ok(());
        }

        tracing::warn!("Destroying DB in {}", dir.display());
        let file_size = engine::ensure_backing_file(&file)?;
        let env = engine::open_environment(
            &dir,
            engine::env_flags(SyncMode::Full),
            config.map.initial_for_file(file_size),
        )?;
        let db = env.open_db(None).map_err(engine_err)?;

        let mut handle = WriteHandle::begin(&env, db)?;
        handle.clear()?;
        handle.commit(STORE)?;
        env.sync(true).map_err(|e| {
            tracing::error!("DB can't be destroyed: {}", e);
            engine_err(e)
        })
    }

    fn write(&self, batch: &mut dyn WriteBatch) -> Result<()> {
        let inner = self.inner()?;
        let inserts = batch.extract_raw_data_to_insert();
        let removals = batch.extract_raw_keys_to_remove();
        inner.apply(inserts, removals)
    }

    /// Each call opens and drops its own snapshot; callers issuing many reads
    /// hold one from [`LmdbDatabase::snapshot`] and use
    /// [`LmdbDatabase::read_with`] to renew it instead.
    fn read(&self, batch: &mut dyn ReadBatch) -> Result<()> {
        let snapshot = self.snapshot()?;
        lookup(&snapshot, batch)
    }

    fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }
}

fn lookup(snapshot: &Snapshot<'_>, batch: &mut dyn ReadBatch) -> Result<()> {
    let results = batch
        .raw_keys()
        .iter()
        .map(|key| {
            Ok(match snapshot.get(key)? {
                Some(value) => ReadResult::found(value),
                None => ReadResult::missing(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    batch.submit_raw_result(results);
    Ok(())
}

/// One mutation of a write batch
#[derive(Debug, Clone, Copy)]
enum Op<'a> {
    Put(&'a [u8], &'a [u8]),
    Del(&'a [u8]),
}

impl Op<'_> {
    fn key(&self) -> &[u8] {
        match self {
            Op::Put(key, _) | Op::Del(key) => key,
        }
    }

    fn size(&self) -> usize {
        match self {
            Op::Put(key, value) => key.len() + value.len(),
            Op::Del(key) => key.len(),
        }
    }
}

/// Outcome of one attempt at a chunk of mutations
enum ChunkAttempt {
    Committed { applied: u64, failed: usize },
    MapFull,
}

impl OpenDatabase {
    fn apply(&self, inserts: Vec<(Vec<u8>, Vec<u8>)>, removals: Vec<Vec<u8>>) -> Result<()> {
        let mut writer = self.writer.lock();

        // Removals after inserts: a key both inserted and removed ends up absent
        let ops: Vec<Op<'_>> = inserts
            .iter()
            .map(|(key, value)| Op::Put(key, value))
            .chain(removals.iter().map(|key| Op::Del(key)))
            .collect();
        let attempted = ops.len();
        let mut failed = 0;

        for chunk in ops.chunks(self.max_txn_ops) {
            let incoming = chunk.iter().map(Op::size).sum();
            self.resize_best_effort(incoming);

            loop {
                match self.apply_chunk(chunk)? {
                    ChunkAttempt::Committed {
                        applied,
                        failed: rejected,
                    } => {
                        writer.dirty += applied;
                        failed += rejected;
                        break;
                    }
                    ChunkAttempt::MapFull => {
                        match grow_after_map_full(
                            &self.env,
                            &self.growth,
                            &self.live_snapshots,
                            STORE,
                        )? {
                            ResizeOutcome::Grown { .. } => continue,
                            _ => {
                                tracing::warn!(
                                    "DB map full and resize deferred, dropping {} operations",
                                    chunk.len()
                                );
                                failed += chunk.len();
                                break;
                            }
                        }
                    }
                }
            }
        }

        if writer.dirty >= self.max_dirty {
            self.flush_locked(&mut writer)?;
        }

        if failed > 0 {
            Err(StoreError::PartialWrite { failed, attempted })
        } else {
            Ok(())
        }
    }

    /// Apply `chunk` in one write transaction
    ///
    /// A full map poisons the transaction, so it is aborted and nothing in
    /// the chunk lands. Other per-key errors are skipped and counted.
    fn apply_chunk(&self, chunk: &[Op<'_>]) -> Result<ChunkAttempt> {
        let mut handle = WriteHandle::begin(&self.env, self.db)?;
        let mut applied = 0;
        let mut failed = 0;

        for op in chunk {
            let result = match *op {
                Op::Put(key, value) => handle.put(key, value).map(|()| true),
                Op::Del(key) => handle.del(key),
            };
            match result {
                Ok(true) => applied += 1,
                Ok(false) => {
                    tracing::trace!(
                        key = %String::from_utf8_lossy(op.key()),
                        "Key to remove is absent"
                    );
                }
                Err(StoreError::MapFull) => return Ok(ChunkAttempt::MapFull),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        key = %String::from_utf8_lossy(op.key()),
                        "Failed to apply operation: {}",
                        e
                    );
                }
            }
        }

        match handle.commit(STORE) {
            Ok(_) => Ok(ChunkAttempt::Committed { applied, failed }),
            Err(StoreError::MapFull) => Ok(ChunkAttempt::MapFull),
            Err(e) => Err(e),
        }
    }

    fn flush_locked(&self, writer: &mut WriterState) -> Result<()> {
        let started = Instant::now();
        tracing::debug!("Flushing {} dirty commits to disk", writer.dirty);
        self.env.sync(true).map_err(engine_err)?;
        writer.dirty = 0;
        observe::record_flush(STORE, started.elapsed());
        Ok(())
    }

    fn resize_best_effort(&self, incoming: usize) {
        if let Err(e) =
            check_resize_for(&self.env, &self.growth, &self.live_snapshots, STORE, incoming)
        {
            tracing::warn!("DB resize check failed, retrying on next write: {}", e);
        }
    }
}

impl Drop for OpenDatabase {
    fn drop(&mut self) {
        if let Err(e) = self.env.sync(true) {
            tracing::error!("Failed to sync DB on close: {}", e);
        }
    }
}
