pub mod chain;
pub mod database;

pub use chain::MainChainStorage;
pub use database::Database;
