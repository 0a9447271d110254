//! Ledger engine: the consistency core.
//!
//! The engine composes the account relation and the transaction log behind
//! one operation pair (`apply`, `statement`) and owns the invariants:
//!
//! - `balance >= -overdraft_limit` for every account at all times, including
//!   under concurrent debits on the same account
//! - a balance update and its log append commit or roll back together
//! - calls on the same account are totally ordered by hold acquisition;
//!   calls on different accounts never block one another
//!
//! The read-check-write sequence for a debit runs entirely inside one
//! per-account unit of work obtained from the store, which is what rules out
//! the classic lost-update race (two debits both reading a balance that
//! still clears the floor, then both committing). A hold that cannot be
//! acquired within `lock_timeout` surfaces as `Unavailable` rather than
//! queueing indefinitely.

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crebit_core::{AccountId, DomainError};
use crebit_ledger::{Account, LedgerEntry, Statement, TransactionCommand};

use crate::store::{LedgerStore, StoreError};

/// Statement depth: how many of the newest transactions a statement carries.
pub const RECENT_TRANSACTIONS: usize = 10;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Outcome taxonomy surfaced to the API layer.
///
/// Every failure is typed and implies "no partial state": either both the
/// balance change and the log append committed, or neither did.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request; nothing was read or written.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The account does not exist.
    #[error("account not found")]
    NotFound,

    /// The debit would violate the overdraft invariant. No record written.
    #[error("debit would exceed the overdraft limit")]
    Rejected,

    /// The per-account hold or the store itself was not available in time.
    /// Nothing was written; safe to retry.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Unexpected storage failure; the unit of work was rolled back.
    #[error("internal ledger failure: {0}")]
    Internal(String),
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::InvalidInput(msg),
            DomainError::InvalidId(msg) => EngineError::InvalidInput(msg),
            DomainError::OverdraftExceeded => EngineError::Rejected,
            DomainError::NotFound => EngineError::NotFound,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => EngineError::NotFound,
            StoreError::LockTimeout(msg) => EngineError::Unavailable(msg),
            StoreError::Unavailable(msg) => EngineError::Unavailable(msg),
            StoreError::Backend(msg) => EngineError::Internal(msg),
        }
    }
}

/// Post-transaction view returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceView {
    pub balance: i64,
    pub overdraft_limit: i64,
}

/// Account ledger engine.
///
/// Generic over the store so the same pipeline runs against the in-memory
/// registry in tests and Postgres in production. The engine is the sole
/// writer of account balances and the transaction log.
#[derive(Debug)]
pub struct LedgerEngine<S> {
    store: S,
    lock_timeout: Duration,
}

impl<S> LedgerEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Bound on waiting for the per-account hold (and on the snapshot read).
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Apply one credit or debit to an account.
    ///
    /// Pipeline:
    /// 1. validate the command (invalid input never touches the store)
    /// 2. open the per-account unit of work (exclusive hold + state read)
    /// 3. decide the new balance against the overdraft invariant
    /// 4. stamp `occurred_at` inside the hold, so per-account timestamps are
    ///    non-decreasing in commit order
    /// 5. commit balance + log entry atomically, or abort with no trace
    pub async fn apply(
        &self,
        account_id: AccountId,
        command: TransactionCommand,
    ) -> Result<BalanceView, EngineError> {
        command.validate()?;

        let unit = tokio::time::timeout(self.lock_timeout, self.store.begin(account_id))
            .await
            .map_err(|_| {
                EngineError::Unavailable(format!(
                    "account {account_id} hold not acquired within {:?}",
                    self.lock_timeout
                ))
            })??;

        let account = Account {
            id: account_id,
            overdraft_limit: unit.overdraft_limit(),
            balance: unit.balance(),
        };

        let new_balance = match account.decide(&command) {
            Ok(balance) => balance,
            Err(e) => {
                unit.abort().await;
                debug!(account_id = %account_id, kind = %command.kind, value = command.value,
                       "transaction rejected");
                return Err(e.into());
            }
        };

        let entry = LedgerEntry {
            kind: command.kind,
            value: command.value,
            description: command.description,
            occurred_at: Utc::now(),
        };
        unit.commit(new_balance, entry).await?;

        debug!(account_id = %account_id, kind = %command.kind, value = command.value,
               balance = new_balance, "transaction committed");

        Ok(BalanceView {
            balance: new_balance,
            overdraft_limit: account.overdraft_limit,
        })
    }

    /// Snapshot the account: balance, limit, and the newest
    /// [`RECENT_TRANSACTIONS`] entries, newest first.
    ///
    /// The snapshot is consistent with any concurrently committing
    /// transaction: the list and the balance always reflect the same
    /// committed state. All accepted transactions are eligible; the cap is
    /// strictly by count.
    pub async fn statement(&self, account_id: AccountId) -> Result<Statement, EngineError> {
        let snapshot = tokio::time::timeout(
            self.lock_timeout,
            self.store.statement(account_id, RECENT_TRANSACTIONS),
        )
        .await
        .map_err(|_| {
            EngineError::Unavailable(format!(
                "account {account_id} snapshot not served within {:?}",
                self.lock_timeout
            ))
        })??;

        Ok(Statement {
            balance: snapshot.balance,
            overdraft_limit: snapshot.overdraft_limit,
            as_of: Utc::now(),
            recent: snapshot.entries,
        })
    }
}
