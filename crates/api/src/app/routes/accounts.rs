use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crebit_core::AccountId;
use crebit_ledger::TransactionCommand;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id/transactions", post(post_transaction))
        .route("/:id/statement", get(get_statement))
}

pub async fn post_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
    Json(body): Json<dto::TransactionRequest>,
) -> axum::response::Response {
    let kind = match errors::parse_transaction_kind(&body.kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    let command = TransactionCommand {
        kind,
        value: body.value,
        description: body.description,
    };

    match services.engine().apply(AccountId::new(id), command).await {
        Ok(view) => (StatusCode::OK, Json(dto::balance_to_json(view))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_statement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match services.engine().statement(AccountId::new(id)).await {
        Ok(statement) => {
            (StatusCode::OK, Json(dto::statement_to_json(statement))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}
