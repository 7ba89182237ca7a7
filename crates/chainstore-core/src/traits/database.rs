use crate::config::DataBaseConfig;
use crate::error::Result;
use crate::types::{ReadBatch, WriteBatch};

/// Generic transactional key-value database used by the node layer
///
/// Lifecycle: `init` moves the instance from not-initialized to initialized,
/// `shutdown` moves it back. Data operations outside the initialized state
/// fail with `NotInitialized`; `init` or `destroy` on an initialized
/// instance fail with `AlreadyInitialized`.
pub trait Database {
    /// Open (creating if needed) the database described by `config`
    fn init(&mut self, config: &DataBaseConfig) -> Result<()>;

    /// Flush everything to stable storage and close
    fn shutdown(&mut self) -> Result<()>;

    /// Drop every key of the database described by `config`
    ///
    /// Irreversible. Only legal while the instance is not initialized, so a
    /// live environment is never destroyed underneath its users.
    fn destroy(&mut self, config: &DataBaseConfig) -> Result<()>;

    /// Apply all insertions, then all removals, of `batch`
    ///
    /// Best effort: failed operations are reported together as
    /// `PartialWrite` and the ones that succeeded stay applied.
    fn write(&self, batch: &mut dyn WriteBatch) -> Result<()>;

    /// Look up every key of `batch` in the latest committed snapshot
    ///
    /// Missing keys are reported through `ReadResult::found`, never as errors.
    fn read(&self, batch: &mut dyn ReadBatch) -> Result<()>;

    fn is_initialized(&self) -> bool;
}
