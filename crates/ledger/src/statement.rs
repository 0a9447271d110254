use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transaction::LedgerEntry;

/// Snapshot of an account: balance, limit, and the most recent transactions.
///
/// `balance` and `recent` reflect the same committed state: no entry appears
/// in `recent` without its effect in `balance`, and no committed transaction
/// that affected `balance` is missing from a list that claims to be the most
/// recent. `recent` is ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub balance: i64,
    pub overdraft_limit: i64,
    /// When this snapshot was taken.
    pub as_of: DateTime<Utc>,
    pub recent: Vec<LedgerEntry>,
}
