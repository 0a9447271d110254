//! Infrastructure layer: ledger stores and the engine that composes them.

pub mod engine;
pub mod store;

pub use engine::{BalanceView, EngineError, LedgerEngine, RECENT_TRANSACTIONS};
pub use store::in_memory::InMemoryLedgerStore;
pub use store::postgres::PostgresLedgerStore;
pub use store::{AccountUnit, LedgerStore, StatementSnapshot, StoreError};

#[cfg(test)]
mod integration_tests;
