use crate::types::block::RawBlock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix appended to the currency's blocks file name to form the ledger file
pub const LEDGER_FILE_SUFFIX: &str = ".lmdb";

const TESTNET_PREFIX: &str = "testnet_";

/// The parts of a currency definition the storage layer consumes
///
/// Building the genesis block is consensus logic and happens outside this
/// crate; the profile only carries its serialized bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyProfile {
    /// Base name of the blocks file, e.g. `blocks.bin`
    pub blocks_file_name: String,

    /// Serialized genesis block
    #[serde(with = "hex")]
    pub genesis_block: Vec<u8>,
}

impl CurrencyProfile {
    pub fn new(blocks_file_name: impl Into<String>, genesis_block: Vec<u8>) -> Self {
        Self {
            blocks_file_name: blocks_file_name.into(),
            genesis_block,
        }
    }

    /// Test-network variant: file names get a `testnet_` prefix
    pub fn testnet(mut self) -> Self {
        if !self.blocks_file_name.starts_with(TESTNET_PREFIX) {
            self.blocks_file_name = format!("{}{}", TESTNET_PREFIX, self.blocks_file_name);
        }
        self
    }

    /// Height-0 record pushed into an empty ledger
    pub fn genesis_raw_block(&self) -> RawBlock {
        RawBlock::new(self.genesis_block.clone())
    }

    /// `<data_dir>/<blocks_file_name>.lmdb`
    pub fn ledger_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}{}", self.blocks_file_name, LEDGER_FILE_SUFFIX))
    }
}
