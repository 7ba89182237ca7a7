use chainstore_core::{error::Result, traits::MainChainStorage, CurrencyProfile, LedgerConfig};
use std::path::Path;

use crate::chain::LmdbMainChainStorage;

/// Open the main chain storage of a currency under `data_dir`
///
/// The ledger file is named after the currency's blocks file with the
/// `.lmdb` suffix. An empty ledger is seeded with the genesis block.
pub fn create_swapped_main_chain_storage(
    data_dir: &Path,
    currency: &CurrencyProfile,
) -> Result<LmdbMainChainStorage> {
    create_swapped_main_chain_storage_with_config(
        LedgerConfig::new(currency.ledger_path(data_dir)),
        currency,
    )
}

/// Same as [`create_swapped_main_chain_storage`] with explicit ledger settings
pub fn create_swapped_main_chain_storage_with_config(
    config: LedgerConfig,
    currency: &CurrencyProfile,
) -> Result<LmdbMainChainStorage> {
    let mut storage = LmdbMainChainStorage::open(config)?;
    if storage.get_block_count() == 0 {
        tracing::info!("Main chain storage is empty, pushing genesis block");
        storage.push_block(&currency.genesis_raw_block())?;
    }
    Ok(storage)
}
