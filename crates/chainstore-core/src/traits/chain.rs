use crate::error::Result;
use crate::types::{BlockIndex, RawBlock};

/// Append-only, densely indexed storage of the main chain
///
/// Blocks occupy heights `0..get_block_count()` without gaps. Only the tip
/// can be removed.
pub trait MainChainStorage {
    /// Append `raw_block` at height `get_block_count()`
    fn push_block(&mut self, raw_block: &RawBlock) -> Result<()>;

    /// Remove the tip; a no-op on an empty chain
    fn pop_block(&mut self) -> Result<()>;

    /// Fails with `BlockNotFound` for any index at or beyond the block count
    fn get_block_by_index(&self, index: BlockIndex) -> Result<RawBlock>;

    fn get_block_count(&self) -> BlockIndex;

    /// Not supported by any backend; always fails
    fn clear(&mut self) -> Result<()>;
}
