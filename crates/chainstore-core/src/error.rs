use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The memory map ran out of room; the transaction that hit it is dead
    #[error("Storage map is full")]
    MapFull,

    #[error("Database is not initialized")]
    NotInitialized,

    #[error("Database is already initialized")]
    AlreadyInitialized,

    #[error("Batch partially applied: {failed} of {attempted} operations failed")]
    PartialWrite { failed: usize, attempted: usize },

    #[error("Could not find block for given index: {0}")]
    BlockNotFound(u32),

    #[error("Block at index {index} is unreadable: {reason}")]
    CorruptBlock { index: u32, reason: String },

    #[error("Snapshot unavailable after {0} failed renewals")]
    SnapshotUnavailable(u32),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl StoreError {
    /// Programmer errors: using the store outside the state that allows the call.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            StoreError::NotInitialized | StoreError::AlreadyInitialized
        )
    }

    /// The requested record never existed (as opposed to being unreadable).
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::BlockNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
