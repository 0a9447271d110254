use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crebit_core::{DomainError, DomainResult};

/// Upper bound on transaction description length, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 10;

/// Direction of a ledger transaction.
///
/// The sign of a transaction is implied by its kind; `value` is always a
/// positive magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionKind::Credit),
            "debit" => Ok(TransactionKind::Debit),
            other => Err(DomainError::validation(format!(
                "kind must be 'credit' or 'debit', got '{other}'"
            ))),
        }
    }
}

/// Command: apply one credit or debit to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCommand {
    pub kind: TransactionKind,
    /// Positive amount in the smallest currency unit.
    pub value: i64,
    pub description: String,
}

impl TransactionCommand {
    /// Deterministic input validation; no account state involved.
    pub fn validate(&self) -> DomainResult<()> {
        if self.value <= 0 {
            return Err(DomainError::validation("value must be positive"));
        }
        let chars = self.description.chars().count();
        if chars == 0 {
            return Err(DomainError::validation("description must not be empty"));
        }
        if chars > DESCRIPTION_MAX_CHARS {
            return Err(DomainError::validation(format!(
                "description must be at most {DESCRIPTION_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }
}

/// One accepted transaction, as it is recorded in the log and surfaced on
/// statements.
///
/// Entries are created exactly once, at acceptance time, and are immutable.
/// Rejected debits never produce an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: TransactionKind,
    pub value: i64,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}
