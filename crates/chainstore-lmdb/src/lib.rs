//! LMDB-backed node storage
//!
//! Provides the generic key/value [`LmdbDatabase`] and the append-only block
//! ledger [`LmdbMainChainStorage`].
//!
//! Key features:
//! - Batched writes split into bounded write transactions
//! - Deferred durability: explicit flushes once a dirty threshold is crossed
//! - Automatic map growth when free space runs low
//! - Renewable long-lived snapshots
//! - Big-endian block heights for proper sort order
//! - Single-writer semantics (enforced by mutex)

pub mod bootstrap;
pub mod chain;
mod engine;
pub mod keys;
pub mod resize;
pub mod snapshot;
pub mod store;
mod txn;

pub use bootstrap::{
    create_swapped_main_chain_storage, create_swapped_main_chain_storage_with_config,
};
pub use chain::{LedgerStats, LmdbMainChainStorage};
pub use engine::MapInfo;
pub use resize::ResizeOutcome;
pub use snapshot::{RenewalOutcome, Snapshot, MAX_RENEWAL_FAILURES};
pub use store::LmdbDatabase;
