use chainstore_core::BlockIndex;

/// Format a block height as big-endian bytes (preserves sort order in LMDB)
pub fn height_to_key(index: BlockIndex) -> [u8; 4] {
    index.to_be_bytes()
}

/// Parse a block height from big-endian bytes
pub fn key_to_height(bytes: &[u8]) -> Option<BlockIndex> {
    <[u8; 4]>::try_from(bytes)
        .ok()
        .map(BlockIndex::from_be_bytes)
}
