//! financeLedger - wallet, account, and deposit ledger
//!
//! Moves money between wallets, accounts, and term deposits under a
//! fixed taxonomy of transaction kinds, snapshots account balances
//! daily, and periodically turns earned profit into applied
//! transactions.

use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod jobs;
pub mod ledger;
pub mod profit;
pub mod snapshot;
pub mod storage;

pub use api::AppState;
pub use config::Config;
pub use error::{AppError, AppResult};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let api_router = api::create_router()
        .layer(middleware::from_fn(api::middleware::logging_middleware));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
