use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crebit_core::AccountId;
use crebit_ledger::{Account, LedgerEntry};

use super::{AccountUnit, LedgerStore, StatementSnapshot, StoreError};

#[derive(Debug)]
struct AccountState {
    overdraft_limit: i64,
    balance: i64,
    /// Append-only; insertion order is the tie-break for equal timestamps.
    entries: Vec<LedgerEntry>,
}

/// In-memory ledger store.
///
/// A key-scoped mutex registry: one async mutex per account, held for the
/// duration of a unit of work. The mutex is the per-account exclusive hold,
/// so the serialization and snapshot-consistency guarantees match the
/// Postgres implementation. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<AccountState>>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an account. Accounts pre-exist from the ledger's
    /// point of view; this is the provisioning seam.
    pub fn provision(
        &self,
        account_id: AccountId,
        overdraft_limit: i64,
        balance: i64,
    ) -> Result<(), StoreError> {
        // Reuse the domain constructor so provisioning rejects the same
        // shapes everywhere (negative limits in particular).
        let account = Account::new(account_id, overdraft_limit, balance)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| StoreError::Backend("account registry poisoned".to_string()))?;
        accounts.insert(
            account_id,
            Arc::new(Mutex::new(AccountState {
                overdraft_limit: account.overdraft_limit,
                balance: account.balance,
                entries: Vec::new(),
            })),
        );
        Ok(())
    }

    fn cell(&self, account_id: AccountId) -> Result<Arc<Mutex<AccountState>>, StoreError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| StoreError::Backend("account registry poisoned".to_string()))?;
        accounts.get(&account_id).cloned().ok_or(StoreError::NotFound)
    }
}

struct InMemoryUnit {
    guard: OwnedMutexGuard<AccountState>,
}

#[async_trait]
impl AccountUnit for InMemoryUnit {
    fn balance(&self) -> i64 {
        self.guard.balance
    }

    fn overdraft_limit(&self) -> i64 {
        self.guard.overdraft_limit
    }

    async fn commit(
        mut self: Box<Self>,
        new_balance: i64,
        entry: LedgerEntry,
    ) -> Result<(), StoreError> {
        // Both mutations happen under the hold before the guard drops, so a
        // reader can never see one without the other.
        self.guard.balance = new_balance;
        self.guard.entries.push(entry);
        Ok(())
    }

    async fn abort(self: Box<Self>) {
        // Dropping the guard releases the hold; nothing was mutated.
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self, account_id: AccountId) -> Result<Box<dyn AccountUnit>, StoreError> {
        let cell = self.cell(account_id)?;
        let guard = cell.lock_owned().await;
        Ok(Box::new(InMemoryUnit { guard }))
    }

    async fn statement(
        &self,
        account_id: AccountId,
        most_recent: usize,
    ) -> Result<StatementSnapshot, StoreError> {
        let cell = self.cell(account_id)?;
        // Taking the account mutex makes the read atomic with respect to any
        // committing unit of work.
        let state = cell.lock().await;
        let entries = state
            .entries
            .iter()
            .rev()
            .take(most_recent)
            .cloned()
            .collect();
        Ok(StatementSnapshot {
            balance: state.balance,
            overdraft_limit: state.overdraft_limit,
            entries,
        })
    }
}
