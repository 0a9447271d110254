//! Ledger persistence port.
//!
//! The store owns the two relations of the ledger (accounts, transaction log)
//! and exposes them through a **per-account unit of work**: `begin` acquires
//! an exclusive hold on one account and reads its state under that hold;
//! `commit` persists a balance update together with a log append atomically
//! and releases the hold; `abort` releases it with no state change.
//!
//! The read-check-write sequence for a debit therefore spans one unit of
//! work, which is what rules out the lost-update race between two concurrent
//! debits that each saw a balance still above the floor.
//!
//! Two implementations with identical semantics:
//! - [`in_memory::InMemoryLedgerStore`]: key-scoped async mutex registry,
//!   used by tests and DB-less local runs
//! - [`postgres::PostgresLedgerStore`]: row-level `SELECT ... FOR UPDATE`
//!   inside a database transaction

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crebit_core::AccountId;
use crebit_ledger::LedgerEntry;

pub mod in_memory;
pub mod postgres;

/// Store operation error.
///
/// Infrastructure failures only; business outcomes (overdraft rejection,
/// input validation) are decided above the store and never reach it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The account does not exist.
    #[error("account not found")]
    NotFound,

    /// The per-account exclusive hold could not be acquired in time.
    #[error("account hold not acquired: {0}")]
    LockTimeout(String),

    /// The backing store cannot be reached right now; safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Unexpected storage failure; the unit of work has been rolled back.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Consistent snapshot served to the statement query.
///
/// `entries` is ordered newest first and reflects the same committed state as
/// `balance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementSnapshot {
    pub balance: i64,
    pub overdraft_limit: i64,
    pub entries: Vec<LedgerEntry>,
}

/// An open, exclusive unit of work scoped to one account.
///
/// While the unit is open, no other credit/debit on the same account can read
/// or write the balance. Dropping the unit without calling `commit` releases
/// the hold with no state change.
#[async_trait]
pub trait AccountUnit: Send {
    /// Balance as read under the exclusive hold.
    fn balance(&self) -> i64;

    /// Overdraft limit of the held account.
    fn overdraft_limit(&self) -> i64;

    /// Atomically persist the new balance and append `entry` to the log,
    /// then release the hold. All or nothing: on error the balance update
    /// and the append are both rolled back.
    async fn commit(
        self: Box<Self>,
        new_balance: i64,
        entry: LedgerEntry,
    ) -> Result<(), StoreError>;

    /// Release the hold, discarding the unit of work.
    async fn abort(self: Box<Self>);
}

impl std::fmt::Debug for dyn AccountUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountUnit").finish()
    }
}

/// Ledger persistence port: accounts relation + append-only transaction log.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open an exclusive unit of work on `account_id`.
    ///
    /// Blocks while another unit on the same account is open; callers bound
    /// the wait (the engine wraps this in a timeout). Units on different
    /// accounts never block one another.
    async fn begin(&self, account_id: AccountId) -> Result<Box<dyn AccountUnit>, StoreError>;

    /// Snapshot balance/limit and the `most_recent` newest log entries for
    /// `account_id`, newest first, consistent with any concurrently
    /// committing unit of work.
    async fn statement(
        &self,
        account_id: AccountId,
        most_recent: usize,
    ) -> Result<StatementSnapshot, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn begin(&self, account_id: AccountId) -> Result<Box<dyn AccountUnit>, StoreError> {
        (**self).begin(account_id).await
    }

    async fn statement(
        &self,
        account_id: AccountId,
        most_recent: usize,
    ) -> Result<StatementSnapshot, StoreError> {
        (**self).statement(account_id, most_recent).await
    }
}
