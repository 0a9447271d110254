//! Store selection and engine wiring.

use std::sync::Arc;
use std::time::Duration;

use crebit_core::AccountId;
use crebit_infra::{InMemoryLedgerStore, LedgerEngine, LedgerStore, PostgresLedgerStore, StoreError};

use crate::config::Config;

/// Demo accounts seeded into DB-less runs: (id, overdraft_limit).
const DEMO_ACCOUNTS: [(i64, i64); 5] = [
    (1, 100_000),
    (2, 80_000),
    (3, 1_000_000),
    (4, 10_000_000),
    (5, 500_000),
];

/// Shared application services injected into handlers.
pub struct AppServices {
    engine: LedgerEngine<Arc<dyn LedgerStore>>,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>, lock_timeout: Duration) -> Self {
        Self {
            engine: LedgerEngine::new(store).with_lock_timeout(lock_timeout),
        }
    }

    pub fn engine(&self) -> &LedgerEngine<Arc<dyn LedgerStore>> {
        &self.engine
    }
}

/// Build the ledger store from configuration.
pub async fn build_store(config: &Config) -> Result<Arc<dyn LedgerStore>, StoreError> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresLedgerStore::connect(url, config.lock_timeout).await?;
            store.migrate().await?;
            tracing::info!("using postgres ledger store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory ledger store with demo accounts");
            Ok(Arc::new(demo_store()?))
        }
    }
}

fn demo_store() -> Result<InMemoryLedgerStore, StoreError> {
    let store = InMemoryLedgerStore::new();
    for (id, overdraft_limit) in DEMO_ACCOUNTS {
        store.provision(AccountId::new(id), overdraft_limit, 0)?;
    }
    Ok(store)
}
