//! HTTP API application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: store selection and engine wiring
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crebit_infra::{LedgerStore, StoreError};

use crate::config::Config;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Selects the store from configuration: Postgres when `DATABASE_URL` is
/// set (bootstrapping the schema), otherwise the in-memory store seeded
/// with demo accounts.
pub async fn build_app(config: &Config) -> Result<Router, StoreError> {
    let store = services::build_store(config).await?;
    Ok(app_with_store(store, config))
}

/// Wire the router around an already-constructed store.
///
/// Split out so tests can inject an in-memory store they control.
pub fn app_with_store(store: Arc<dyn LedgerStore>, config: &Config) -> Router {
    let services = Arc::new(services::AppServices::new(store, config.lock_timeout));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/accounts", routes::accounts::router())
        .layer(Extension(services))
}
