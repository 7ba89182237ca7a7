pub mod batch;
pub mod block;
pub mod currency;

pub use batch::{RawInserts, RawReadBatch, RawWriteBatch, ReadBatch, ReadResult, WriteBatch};
pub use block::{BlockIndex, RawBlock};
pub use currency::{CurrencyProfile, LEDGER_FILE_SUFFIX};
