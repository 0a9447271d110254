use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crebit_infra::EngineError;
use crebit_ledger::TransactionKind;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
        EngineError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
        EngineError::Rejected => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "rejected",
            "debit would exceed the overdraft limit",
        ),
        EngineError::Unavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
        }
        EngineError::Internal(msg) => {
            // Storage details stay in the logs, not on the wire.
            tracing::error!(error = %msg, "internal ledger failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_transaction_kind(s: &str) -> Result<TransactionKind, axum::response::Response> {
    s.parse::<TransactionKind>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            "kind must be one of: credit, debit",
        )
    })
}
