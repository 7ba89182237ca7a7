//! Integration tests for the LMDB block ledger

use chainstore_core::{
    error::StoreError, CurrencyProfile, LedgerConfig, MainChainStorage, MapSizeConfig,
    MemChainStorage, RawBlock,
};
use chainstore_lmdb::{
    create_swapped_main_chain_storage, create_swapped_main_chain_storage_with_config,
    LmdbMainChainStorage,
};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MIB: usize = 1024 * 1024;

fn ledger_path(dir: &TempDir) -> PathBuf {
    dir.path().join("blocks.bin.lmdb")
}

fn small_config(path: &Path) -> LedgerConfig {
    LedgerConfig::new(path).with_map(MapSizeConfig::new(4 * MIB, MIB, 4 * MIB))
}

fn block(height: u32) -> RawBlock {
    RawBlock::new(height.to_le_bytes().to_vec())
        .with_transactions(vec![vec![0xaa; height as usize % 5], vec![]])
}

/// Contract shared by every `MainChainStorage` backend
fn exercise_chain(storage: &mut dyn MainChainStorage) {
    assert_eq!(storage.get_block_count(), 0);
    storage.pop_block().unwrap();
    assert_eq!(storage.get_block_count(), 0);
    assert!(matches!(
        storage.get_block_by_index(0),
        Err(StoreError::BlockNotFound(0))
    ));

    for height in 0..10 {
        storage.push_block(&block(height)).unwrap();
    }
    assert_eq!(storage.get_block_count(), 10);
    for height in 0..10 {
        assert_eq!(storage.get_block_by_index(height).unwrap(), block(height));
    }
    assert!(storage.get_block_by_index(10).unwrap_err().is_not_found());

    storage.pop_block().unwrap();
    storage.pop_block().unwrap();
    assert_eq!(storage.get_block_count(), 8);
    assert!(storage.get_block_by_index(8).unwrap_err().is_not_found());

    // Heights are reused after a pop
    storage.push_block(&block(100)).unwrap();
    assert_eq!(storage.get_block_by_index(8).unwrap(), block(100));

    assert!(matches!(storage.clear(), Err(StoreError::Unsupported(_))));
    assert_eq!(storage.get_block_count(), 9);
}

#[test]
fn test_chain_contract_lmdb() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage =
        LmdbMainChainStorage::open(small_config(&ledger_path(&dir)).with_max_dirty(3)).unwrap();
    exercise_chain(&mut storage);
}

#[test]
fn test_chain_contract_mem() {
    exercise_chain(&mut MemChainStorage::new());
}

#[test]
fn test_count_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = ledger_path(&dir);
    {
        let mut storage = LmdbMainChainStorage::open(small_config(&path)).unwrap();
        for height in 0..25 {
            storage.push_block(&block(height)).unwrap();
        }
        // Most of these are still buffered; drop commits them
        assert!(storage.stats().unwrap().pending > 0);
    }

    let mut storage = LmdbMainChainStorage::open(small_config(&path)).unwrap();
    assert_eq!(storage.get_block_count(), 25);
    assert_eq!(storage.get_block_by_index(24).unwrap(), block(24));

    storage.pop_block().unwrap();
    drop(storage);

    let storage = LmdbMainChainStorage::open(small_config(&path)).unwrap();
    assert_eq!(storage.get_block_count(), 24);
    assert!(storage.get_block_by_index(24).unwrap_err().is_not_found());
}

#[test]
fn test_pushes_committed_in_batches() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage =
        LmdbMainChainStorage::open(small_config(&ledger_path(&dir)).with_max_dirty(3)).unwrap();

    // The first block of an empty ledger is committed immediately
    storage.push_block(&block(0)).unwrap();
    let stats = storage.stats().unwrap();
    assert_eq!((stats.committed, stats.pending, stats.map.entries), (1, 0, 1));

    storage.push_block(&block(1)).unwrap();
    storage.push_block(&block(2)).unwrap();
    let stats = storage.stats().unwrap();
    assert_eq!((stats.committed, stats.pending, stats.map.entries), (1, 2, 1));
    assert_eq!(storage.get_block_by_index(2).unwrap(), block(2));

    storage.push_block(&block(3)).unwrap();
    let stats = storage.stats().unwrap();
    assert_eq!((stats.committed, stats.pending, stats.map.entries), (4, 0, 4));

    storage.push_block(&block(4)).unwrap();
    storage.flush().unwrap();
    let stats = storage.stats().unwrap();
    assert_eq!((stats.block_count, stats.pending, stats.map.entries), (5, 0, 5));
}

#[test]
fn test_map_grows_with_large_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new(ledger_path(&dir))
        .with_map(MapSizeConfig::new(MIB, 512 * 1024, 2 * MIB))
        .with_max_dirty(4);
    let mut storage = LmdbMainChainStorage::open(config).unwrap();

    let large = |height: u32| RawBlock::new(vec![height as u8; 8 * 1024]);
    for height in 0..100 {
        storage.push_block(&large(height)).unwrap();
    }
    storage.flush().unwrap();

    let stats = storage.stats().unwrap();
    assert!(stats.map.map_size >= 3 * MIB);
    assert_eq!(stats.map.entries, 100);
    for height in [0, 57, 99] {
        assert_eq!(storage.get_block_by_index(height).unwrap(), large(height));
    }
}

#[test]
fn test_buffered_blocks_larger_than_free_room() {
    let dir = tempfile::tempdir().unwrap();
    let path = ledger_path(&dir);
    let config = LedgerConfig::new(&path)
        .with_map(MapSizeConfig::new(MIB, 256 * 1024, MIB))
        .with_max_dirty(50);

    let large = |height: u32| RawBlock::new(vec![height as u8; 20 * 1024]);
    {
        let mut storage = LmdbMainChainStorage::open(config.clone()).unwrap();
        for height in 0..200 {
            storage.push_block(&large(height)).unwrap();
        }
        let stats = storage.stats().unwrap();
        assert_eq!(stats.block_count, 200);
        assert_eq!(stats.committed + stats.pending as u32, 200);
        assert!(stats.map.map_size > MIB);
    }

    let storage = LmdbMainChainStorage::open(config).unwrap();
    assert_eq!(storage.get_block_count(), 200);
    for height in [0, 1, 50, 149, 199] {
        assert_eq!(storage.get_block_by_index(height).unwrap(), large(height));
    }
}

#[test]
fn test_bootstrap_seeds_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let genesis = vec![0x01, 0x02, 0x03];
    let currency = CurrencyProfile::new("blocks.bin", genesis.clone());

    let mut storage = create_swapped_main_chain_storage(dir.path(), &currency).unwrap();
    assert_eq!(storage.get_block_count(), 1);
    assert_eq!(storage.get_block_by_index(0).unwrap(), RawBlock::new(genesis));
    assert!(dir.path().join("blocks.bin.lmdb").exists());

    storage.push_block(&block(1)).unwrap();
    drop(storage);

    let storage = create_swapped_main_chain_storage(dir.path(), &currency).unwrap();
    assert_eq!(storage.get_block_count(), 2);
}

#[test]
fn test_bootstrap_testnet_file() {
    let dir = tempfile::tempdir().unwrap();
    let currency = CurrencyProfile::new("blocks.bin", vec![0xff]).testnet();
    let config = small_config(&currency.ledger_path(dir.path()));

    let storage = create_swapped_main_chain_storage_with_config(config, &currency).unwrap();
    assert_eq!(storage.get_block_count(), 1);
    assert_eq!(
        storage.path().file_name().and_then(|name| name.to_str()),
        Some("testnet_blocks.bin.lmdb")
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_blocks_read_back_after_reopen(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..40),
        pops in 0usize..5,
        max_dirty in 1usize..8,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);
        let blocks: Vec<RawBlock> = payloads.into_iter().map(RawBlock::new).collect();
        {
            let mut storage =
                LmdbMainChainStorage::open(small_config(&path).with_max_dirty(max_dirty)).unwrap();
            for raw in &blocks {
                storage.push_block(raw).unwrap();
            }
            for _ in 0..pops {
                storage.pop_block().unwrap();
            }
        }

        let kept = blocks.len().saturating_sub(pops);
        let storage = LmdbMainChainStorage::open(small_config(&path)).unwrap();
        prop_assert_eq!(storage.get_block_count() as usize, kept);
        for (height, raw) in blocks.iter().take(kept).enumerate() {
            prop_assert_eq!(&storage.get_block_by_index(height as u32).unwrap(), raw);
        }
    }
}
