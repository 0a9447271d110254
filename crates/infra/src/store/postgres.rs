//! Postgres-backed ledger store.
//!
//! The per-account exclusive hold is a row-level lock: `begin` opens a
//! database transaction and reads the account with `SELECT ... FOR UPDATE`,
//! which blocks any other unit of work on the same account until this one
//! commits or rolls back. `commit` performs the balance `UPDATE` and the log
//! `INSERT` inside that same transaction, so the pair is all-or-nothing.
//!
//! The statement query is a single `SELECT` (read-committed snapshot): the
//! account row and the joined recent entries come from the same committed
//! state, and the read never waits on row locks held by writers.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL SQLSTATE | StoreError | Scenario |
//! |------------|--------------------|------------|----------|
//! | Database | `55P03` | `LockTimeout` | `lock_timeout` expired waiting on the account row |
//! | Database | `57014` | `Unavailable` | statement cancelled server-side |
//! | Database | class `53xxx` | `Unavailable` | server out of resources / too many connections |
//! | Database (other) | any other | `Backend` | constraint violations, unexpected SQL failures |
//! | PoolTimedOut / PoolClosed / Io | N/A | `Unavailable` | pool exhausted or server unreachable |
//! | Other | N/A | `Backend` | decode failures, protocol errors |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use crebit_core::AccountId;
use crebit_ledger::{Account, LedgerEntry, TransactionKind};

use super::{AccountUnit, LedgerStore, StatementSnapshot, StoreError};

const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Ledger store backed by PostgreSQL.
///
/// Cloneable; the connection pool is internally reference-counted. The
/// configured `lock_timeout` is applied per unit of work with `SET LOCAL`,
/// so a contended account row fails the acquire instead of queueing forever.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Connect a pool with store defaults.
    pub async fn connect(url: &str, lock_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("connect: {e}")))?;
        Ok(Self::new(pool, lock_timeout))
    }

    /// Create the ledger schema if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id              BIGINT PRIMARY KEY,
                overdraft_limit BIGINT NOT NULL CHECK (overdraft_limit >= 0),
                balance         BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("migrate_accounts", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id          BIGSERIAL PRIMARY KEY,
                account_id  BIGINT NOT NULL REFERENCES accounts (id),
                kind        TEXT NOT NULL,
                value       BIGINT NOT NULL CHECK (value > 0),
                description TEXT NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("migrate_transactions", e))?;

        // Serves the statement query: newest entries per account, ties broken
        // by insertion sequence.
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS transactions_account_recent
                ON transactions (account_id, occurred_at DESC, id DESC)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("migrate_index", e))?;

        Ok(())
    }

    /// Create or reset an account. Provisioning seam; not a ledger
    /// operation.
    #[instrument(skip(self), fields(account_id = %account_id), err)]
    pub async fn provision_account(
        &self,
        account_id: AccountId,
        overdraft_limit: i64,
        balance: i64,
    ) -> Result<(), StoreError> {
        let account = Account::new(account_id, overdraft_limit, balance)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, overdraft_limit, balance)
            VALUES ($1, $2, $3)
            ON CONFLICT (id)
            DO UPDATE SET overdraft_limit = EXCLUDED.overdraft_limit,
                          balance = EXCLUDED.balance
            "#,
        )
        .bind(account.id.as_i64())
        .bind(account.overdraft_limit)
        .bind(account.balance)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("provision_account", e))?;

        Ok(())
    }
}

struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
    account_id: AccountId,
    balance: i64,
    overdraft_limit: i64,
}

#[async_trait]
impl AccountUnit for PostgresUnit {
    fn balance(&self) -> i64 {
        self.balance
    }

    fn overdraft_limit(&self) -> i64 {
        self.overdraft_limit
    }

    async fn commit(
        mut self: Box<Self>,
        new_balance: i64,
        entry: LedgerEntry,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
            .bind(new_balance)
            .bind(self.account_id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_balance", e))?;

        sqlx::query(
            r#"
            INSERT INTO transactions (account_id, kind, value, description, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(self.account_id.as_i64())
        .bind(entry.kind.as_str())
        .bind(entry.value)
        .bind(&entry.description)
        .bind(entry.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_entry", e))?;

        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn abort(self: Box<Self>) {
        if let Err(e) = self.tx.rollback().await {
            tracing::warn!(account_id = %self.account_id, error = %e, "rollback failed");
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(account_id = %account_id), err)]
    async fn begin(&self, account_id: AccountId) -> Result<Box<dyn AccountUnit>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        // lock_timeout takes no bind parameters; the value is a sanitized
        // integer from our own config.
        let lock_ms = self.lock_timeout.as_millis().max(1);
        sqlx::query(&format!("SET LOCAL lock_timeout = '{lock_ms}ms'"))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        let row = sqlx::query(
            "SELECT balance, overdraft_limit FROM accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(account_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_account", e))?;

        let Some(row) = row else {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(account_id = %account_id, error = %e, "rollback failed");
            }
            return Err(StoreError::NotFound);
        };

        let balance: i64 = row
            .try_get("balance")
            .map_err(|e| StoreError::Backend(format!("read balance: {e}")))?;
        let overdraft_limit: i64 = row
            .try_get("overdraft_limit")
            .map_err(|e| StoreError::Backend(format!("read overdraft_limit: {e}")))?;

        Ok(Box::new(PostgresUnit {
            tx,
            account_id,
            balance,
            overdraft_limit,
        }))
    }

    #[instrument(skip(self), fields(account_id = %account_id), err)]
    async fn statement(
        &self,
        account_id: AccountId,
        most_recent: usize,
    ) -> Result<StatementSnapshot, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT a.balance, a.overdraft_limit,
                   t.kind, t.value, t.description, t.occurred_at
            FROM accounts a
            LEFT JOIN LATERAL (
                SELECT kind, value, description, occurred_at
                FROM transactions
                WHERE account_id = a.id
                ORDER BY occurred_at DESC, id DESC
                LIMIT $2
            ) t ON TRUE
            WHERE a.id = $1
            "#,
        )
        .bind(account_id.as_i64())
        .bind(most_recent as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("statement", e))?;

        let Some(first) = rows.first() else {
            return Err(StoreError::NotFound);
        };

        let balance: i64 = first
            .try_get("balance")
            .map_err(|e| StoreError::Backend(format!("read balance: {e}")))?;
        let overdraft_limit: i64 = first
            .try_get("overdraft_limit")
            .map_err(|e| StoreError::Backend(format!("read overdraft_limit: {e}")))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            // NULL kind means the LEFT JOIN matched no entries for this
            // account.
            let kind: Option<String> = row
                .try_get("kind")
                .map_err(|e| StoreError::Backend(format!("read kind: {e}")))?;
            let Some(kind) = kind else { continue };
            let kind: TransactionKind = kind
                .parse()
                .map_err(|_| StoreError::Backend(format!("unknown kind '{kind}' in log")))?;

            let value: i64 = row
                .try_get("value")
                .map_err(|e| StoreError::Backend(format!("read value: {e}")))?;
            let description: String = row
                .try_get("description")
                .map_err(|e| StoreError::Backend(format!("read description: {e}")))?;
            let occurred_at: DateTime<Utc> = row
                .try_get("occurred_at")
                .map_err(|e| StoreError::Backend(format!("read occurred_at: {e}")))?;

            entries.push(LedgerEntry {
                kind,
                value,
                description,
                occurred_at,
            });
        }

        Ok(StatementSnapshot {
            balance,
            overdraft_limit,
            entries,
        })
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // lock_timeout expired while waiting on the account row.
                Some("55P03") => StoreError::LockTimeout(msg),
                // Cancelled statement or resource exhaustion: retryable.
                Some("57014") => StoreError::Unavailable(msg),
                Some(code) if code.starts_with("53") => StoreError::Unavailable(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool exhausted in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
