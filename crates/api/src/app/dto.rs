use serde::Deserialize;
use serde_json::json;

use crebit_infra::BalanceView;
use crebit_ledger::Statement;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub value: i64,
    /// Parsed into `TransactionKind` by the handler so that unknown kinds
    /// get a clean invalid-input response instead of a body rejection.
    pub kind: String,
    pub description: String,
}

// -------------------------
// Response mapping
// -------------------------

pub fn balance_to_json(view: BalanceView) -> serde_json::Value {
    json!({
        "balance": view.balance,
        "limit": view.overdraft_limit,
    })
}

pub fn statement_to_json(statement: Statement) -> serde_json::Value {
    let recent: Vec<serde_json::Value> = statement
        .recent
        .iter()
        .map(|entry| {
            json!({
                "value": entry.value,
                "kind": entry.kind.as_str(),
                "description": entry.description,
                "occurred_at": entry.occurred_at,
            })
        })
        .collect();

    json!({
        "balance": statement.balance,
        "limit": statement.overdraft_limit,
        "as_of": statement.as_of,
        "recent_transactions": recent,
    })
}
