//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::LedgerError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Domain errors
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Ledger(ref err) => match err {
                LedgerError::InvalidTransactionKind(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_transaction_kind", Some(err.to_string()))
                }
                LedgerError::MissingRequiredField { .. } => {
                    (StatusCode::BAD_REQUEST, "missing_required_field", Some(err.to_string()))
                }
                LedgerError::ForbiddenField { .. } => {
                    (StatusCode::BAD_REQUEST, "forbidden_field", Some(err.to_string()))
                }
                LedgerError::CurrencyMismatch { .. } => {
                    (StatusCode::BAD_REQUEST, "currency_mismatch", Some(err.to_string()))
                }
                LedgerError::InvalidRate(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_rate", Some(err.to_string()))
                }
                LedgerError::InsufficientBalance { .. } => {
                    (StatusCode::BAD_REQUEST, "insufficient_balance", Some(err.to_string()))
                }
                LedgerError::Money(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_amount", Some(err.to_string()))
                }

                // 403 Forbidden
                LedgerError::SystemKindMisuse(_) => {
                    (StatusCode::FORBIDDEN, "system_kind_misuse", Some(err.to_string()))
                }
                LedgerError::EndpointNotOwned { .. } => {
                    (StatusCode::FORBIDDEN, "endpoint_not_owned", Some(err.to_string()))
                }

                // 404 Not Found
                LedgerError::UserNotFound(_) => {
                    (StatusCode::NOT_FOUND, "user_not_found", Some(err.to_string()))
                }
                LedgerError::WalletNotFound(_) => {
                    (StatusCode::NOT_FOUND, "wallet_not_found", Some(err.to_string()))
                }
                LedgerError::AccountNotFound(_) => {
                    (StatusCode::NOT_FOUND, "account_not_found", Some(err.to_string()))
                }
                LedgerError::DepositNotFound(_) => {
                    (StatusCode::NOT_FOUND, "deposit_not_found", Some(err.to_string()))
                }
                LedgerError::TransactionNotFound(_) => {
                    (StatusCode::NOT_FOUND, "transaction_not_found", Some(err.to_string()))
                }

                // 409 Conflict
                LedgerError::DuplicateCode(_) => {
                    (StatusCode::CONFLICT, "duplicate_code", Some(err.to_string()))
                }
                LedgerError::DuplicateSnapshot { .. } => {
                    (StatusCode::CONFLICT, "duplicate_snapshot", Some(err.to_string()))
                }
                LedgerError::StaleDate { .. } => {
                    (StatusCode::CONFLICT, "stale_date", Some(err.to_string()))
                }
                LedgerError::DuplicateBaseAccount(_) => {
                    (StatusCode::CONFLICT, "duplicate_base_account", Some(err.to_string()))
                }

                // 422 Unprocessable Entity
                LedgerError::BaseAccountMissing(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "base_account_missing", Some(err.to_string()))
                }

                // 500 Internal Server Error: integrity conditions
                LedgerError::CodeSpaceExhausted => {
                    tracing::error!("Transaction code space exhausted");
                    (StatusCode::INTERNAL_SERVER_ERROR, "code_space_exhausted", None)
                }
                LedgerError::SnapshotGap { .. } => {
                    tracing::error!(error = %err, "Snapshot gap detected");
                    (StatusCode::INTERNAL_SERVER_ERROR, "snapshot_gap", Some(err.to_string()))
                }
            },

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
