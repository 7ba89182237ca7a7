//! Environment plumbing shared by the store and the ledger.
//!
//! The `lmdb` crate does not expose environment info, environment stats or
//! map resizing, so those go through `lmdb-sys` directly.

use chainstore_core::{
    error::{Result, StoreError},
    SyncMode,
};
use lmdb::{Environment, EnvironmentFlags};
use std::fs::OpenOptions;
use std::mem::MaybeUninit;
use std::os::raw::c_int;
use std::path::Path;

/// Convert an engine error into the store taxonomy
pub(crate) fn engine_err(e: lmdb::Error) -> StoreError {
    match e {
        lmdb::Error::MapFull => StoreError::MapFull,
        e => StoreError::Transaction(e.to_string()),
    }
}

fn check(rc: c_int) -> Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(engine_err(lmdb::Error::from_err_code(rc)))
    }
}

/// Flags every environment is opened with, plus the sync mode
///
/// `NO_TLS` lets one thread hold several snapshots at once.
pub(crate) fn env_flags(sync_mode: SyncMode) -> EnvironmentFlags {
    let mut flags =
        EnvironmentFlags::WRITE_MAP | EnvironmentFlags::NO_READAHEAD | EnvironmentFlags::NO_TLS;
    match sync_mode {
        SyncMode::Full => {}
        SyncMode::NoMetaSync => flags.insert(EnvironmentFlags::NO_META_SYNC),
        SyncMode::MapAsync => flags.insert(EnvironmentFlags::MAP_ASYNC),
        SyncMode::NoSync => flags.insert(EnvironmentFlags::NO_SYNC | EnvironmentFlags::MAP_ASYNC),
    }
    flags
}

/// Create the backing file if it is missing and return its size
pub(crate) fn ensure_backing_file(path: &Path) -> Result<u64> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file.metadata()?.len())
}

pub(crate) fn open_environment(
    path: &Path,
    flags: EnvironmentFlags,
    map_size: usize,
) -> Result<Environment> {
    let mut builder = Environment::new();
    builder.set_flags(flags);
    builder.set_map_size(map_size);
    builder
        .open_with_permissions(path, 0o664)
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))
}

/// Snapshot of an environment's space accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapInfo {
    /// Configured map size in bytes
    pub map_size: usize,

    /// Engine page size in bytes
    pub page_size: usize,

    /// Last allocated page number
    pub last_pgno: usize,

    /// Entries in the main table (committed data only)
    pub entries: usize,
}

impl MapInfo {
    pub fn used_bytes(&self) -> usize {
        self.page_size.saturating_mul(self.last_pgno)
    }

    pub fn available_bytes(&self) -> usize {
        self.map_size.saturating_sub(self.used_bytes())
    }
}

pub(crate) fn map_info(env: &Environment) -> Result<MapInfo> {
    let mut info = MaybeUninit::<lmdb_sys::MDB_envinfo>::uninit();
    let mut stat = MaybeUninit::<lmdb_sys::MDB_stat>::uninit();

    // SAFETY: `env.env()` is a live environment for the duration of the
    // borrow and both out-pointers are valid for writes.
    let (info, stat) = unsafe {
        check(lmdb_sys::mdb_env_info(env.env(), info.as_mut_ptr()))?;
        check(lmdb_sys::mdb_env_stat(env.env(), stat.as_mut_ptr()))?;
        (info.assume_init(), stat.assume_init())
    };

    Ok(MapInfo {
        map_size: info.me_mapsize,
        page_size: stat.ms_psize as usize,
        last_pgno: info.me_last_pgno,
        entries: stat.ms_entries,
    })
}

/// Grow (or set) the map size
///
/// The caller must guarantee that no transaction of this process is active.
pub(crate) fn set_map_size(env: &Environment, map_size: usize) -> Result<()> {
    // SAFETY: `env.env()` is a live environment; transaction quiescence is
    // the caller's obligation, see above.
    check(unsafe { lmdb_sys::mdb_env_set_mapsize(env.env(), map_size) })
}
