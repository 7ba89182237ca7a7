//! Map growth checks.
//!
//! Each environment has a fixed-size memory map. Before writes (and after
//! commits) the stores compare the remaining room with a configured floor and
//! grow the map when it is reached. Growing requires that no transaction of
//! this process is active, so the check is deferred while snapshots are live.

use chainstore_core::{
    error::{Result, StoreError},
    observe, MapSizeConfig,
};
use lmdb::Environment;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::{self, engine_err, MapInfo};

/// Result of a single resize check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Enough room left
    NotNeeded,
    /// The map was grown
    Grown { from: usize, to: usize },
    /// Growth is due but snapshots are still open
    Deferred { live_snapshots: usize },
}

/// Growth policy derived from [`MapSizeConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MapGrowth {
    min_free: usize,
    growth: usize,
}

impl MapGrowth {
    pub fn from_config(config: &MapSizeConfig) -> Self {
        Self {
            min_free: config.min_free_bytes,
            growth: config.growth_bytes,
        }
    }

    /// New map size if growth is due, `None` otherwise
    pub fn plan(&self, map_size: usize, used: usize) -> Option<usize> {
        self.plan_for(map_size, used, 0)
    }

    /// Same as [`MapGrowth::plan`] with `incoming` bytes about to be written
    ///
    /// The floor is raised by `incoming`, and the map grows by one increment
    /// plus one more for every full increment `incoming` spans.
    pub fn plan_for(&self, map_size: usize, used: usize, incoming: usize) -> Option<usize> {
        let available = map_size.saturating_sub(used);
        if available > self.min_free.saturating_add(incoming) {
            return None;
        }
        let steps = 1 + incoming / self.growth.max(1);
        Some(map_size.saturating_add(self.growth.saturating_mul(steps)))
    }
}

/// Grow the map if the remaining room is at or below the floor
pub(crate) fn check_resize(
    env: &Environment,
    growth: &MapGrowth,
    live_snapshots: &AtomicUsize,
    store: &'static str,
) -> Result<ResizeOutcome> {
    check_resize_for(env, growth, live_snapshots, store, 0)
}

/// Grow the map if the remaining room minus `incoming` bytes is at or below the floor
pub(crate) fn check_resize_for(
    env: &Environment,
    growth: &MapGrowth,
    live_snapshots: &AtomicUsize,
    store: &'static str,
    incoming: usize,
) -> Result<ResizeOutcome> {
    let info = engine::map_info(env)?;
    let Some(new_size) = growth.plan_for(info.map_size, info.used_bytes(), incoming) else {
        return Ok(ResizeOutcome::NotNeeded);
    };
    if let Some(deferred) = deferral(live_snapshots, &info) {
        return Ok(deferred);
    }
    grow(env, info.map_size, new_size, store)
}

/// Grow by one increment after a transaction failed with a full map
///
/// The floor is not consulted: the engine already proved the room too small.
pub(crate) fn grow_after_map_full(
    env: &Environment,
    growth: &MapGrowth,
    live_snapshots: &AtomicUsize,
    store: &'static str,
) -> Result<ResizeOutcome> {
    let info = engine::map_info(env)?;
    if let Some(deferred) = deferral(live_snapshots, &info) {
        return Ok(deferred);
    }
    let new_size = info.map_size.saturating_add(growth.growth);
    if new_size == info.map_size {
        return Err(StoreError::MapFull);
    }
    tracing::warn!("DB map full at {} bytes, growing", info.map_size);
    grow(env, info.map_size, new_size, store)
}

fn deferral(live_snapshots: &AtomicUsize, info: &MapInfo) -> Option<ResizeOutcome> {
    let live = live_snapshots.load(Ordering::SeqCst);
    if live == 0 {
        return None;
    }
    tracing::warn!(
        "DB resize deferred: {} snapshots still open ({} of {} bytes free)",
        live,
        info.available_bytes(),
        info.map_size
    );
    Some(ResizeOutcome::Deferred {
        live_snapshots: live,
    })
}

fn grow(env: &Environment, from: usize, to: usize, store: &'static str) -> Result<ResizeOutcome> {
    env.sync(true).map_err(engine_err)?;
    engine::set_map_size(env, to)?;
    tracing::debug!("Resizing database. New mapsize: {} bytes", to);
    observe::record_resize(store, to);
    Ok(ResizeOutcome::Grown { from, to })
}
