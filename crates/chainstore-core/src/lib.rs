//! chainstore core: contracts and types for the node storage layer
//!
//! This crate defines the backend-agnostic pieces of a blockchain node's
//! durable storage:
//! - Generic database: batched get/put/delete over opaque byte strings
//! - Main chain storage: append-only, densely indexed block records
//! - Write/read batches: transfer objects between the node and a store
//! - Raw blocks: opaque block payloads with a canonical text form
//!
//! Backends (LMDB, in-memory) implement the [`Database`] and
//! [`MainChainStorage`] traits.

pub mod config;
pub mod error;
pub mod mem;
pub mod observe;
pub mod traits;
pub mod types;

pub use config::{DataBaseConfig, LedgerConfig, MapSizeConfig, SyncMode};
pub use error::{Result, StoreError};
pub use mem::{MemChainStorage, MemDatabase};
pub use traits::{Database, MainChainStorage};
pub use types::{
    BlockIndex, CurrencyProfile, RawBlock, RawInserts, RawReadBatch, RawWriteBatch, ReadBatch,
    ReadResult, WriteBatch, LEDGER_FILE_SUFFIX,
};
