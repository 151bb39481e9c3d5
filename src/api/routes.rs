//! API Routes
//!
//! HTTP endpoint definitions.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Account, AccountType, Amount, Currency, Deposit, FieldRequirement, LedgerError, Transaction,
    TransactionDraft, TransactionKind, User, Wallet,
};
use crate::error::AppResult;
use crate::ledger::{Applier, Ledger};
use crate::profit::{AccrualReport, ProfitConfig, ProfitEngine};
use crate::snapshot::{SnapshotBook, SnapshotRunReport};
use crate::storage::PgStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub applier: Applier,
    pub snapshots: SnapshotBook,
    pub engine: ProfitEngine,
    /// Journal; absent when running purely in memory.
    pub repo: Option<PgStore>,
}

impl AppState {
    pub fn new(
        ledger: Ledger,
        snapshots: SnapshotBook,
        profit: ProfitConfig,
        repo: Option<PgStore>,
    ) -> Self {
        let applier = Applier::new(ledger.clone());
        let engine = ProfitEngine::new(ledger.clone(), snapshots.clone(), profit);
        Self {
            ledger,
            applier,
            snapshots,
            engine,
            repo,
        }
    }
}

/// Build the v1 API router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/transaction-kinds", get(list_transaction_kinds))
        .route("/transactions", post(submit_transaction))
        .route("/transactions/:id", get(get_transaction))
        .route("/users", post(create_user))
        .route("/wallets", post(create_wallet))
        .route("/wallets/:id", get(get_wallet))
        .route("/accounts", post(create_account))
        .route("/accounts/lookup", get(lookup_accounts))
        .route("/accounts/:id", get(get_account))
        .route("/deposits", post(create_deposit))
        .route("/deposits/:id", get(get_deposit))
        .route("/deposits/:id/close", post(close_deposit))
        .route("/jobs/snapshots", post(run_snapshot_job))
        .route("/jobs/accrue", post(run_accrual_job))
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize)]
pub struct FieldRule {
    pub field: &'static str,
    pub requirement: &'static str,
}

#[derive(Debug, Serialize)]
pub struct KindDescriptor {
    pub kind: &'static str,
    pub fields: Vec<FieldRule>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitTransactionRequest {
    pub user_id: Uuid,
    pub kind: String,
    /// Decimal amount as a string, e.g. "125000.50"
    pub amount: String,
    #[serde(default)]
    pub source_wallet: Option<Uuid>,
    #[serde(default)]
    pub destination_wallet: Option<Uuid>,
    #[serde(default)]
    pub source_account: Option<Uuid>,
    #[serde(default)]
    pub destination_account: Option<Uuid>,
    #[serde(default)]
    pub destination_deposit: Option<Uuid>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct TransactionReceiptResponse {
    pub transaction_id: Uuid,
    pub code: String,
    pub kind: String,
    pub amount: Decimal,
    pub credited_amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    pub user_id: Uuid,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub user_id: Uuid,
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
    #[serde(default)]
    pub daily_profit_rate: Decimal,
    #[serde(default)]
    pub opened_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDepositRequest {
    pub user_id: Uuid,
    pub currency: String,
    pub annual_profit_rate: Decimal,
    pub term_days: i64,
    #[serde(default)]
    pub opened_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CloseDepositRequest {
    #[serde(default)]
    pub closed_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub user_id: Uuid,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: Uuid,
    pub name: String,
    pub account_type: AccountType,
}

#[derive(Debug, Serialize)]
pub struct AccountLookupResponse {
    pub source_accounts: Vec<AccountSummary>,
    pub destination_accounts: Vec<AccountSummary>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotJobRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AccrualJobRequest {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

// =========================================================================
// Transaction endpoints
// =========================================================================

/// The fixed taxonomy of caller-submittable transaction kinds, with the
/// endpoint fields each one requires.
async fn list_transaction_kinds() -> Json<Vec<KindDescriptor>> {
    let kinds = TransactionKind::user_initiated()
        .map(|kind| KindDescriptor {
            kind: kind.as_str(),
            fields: kind
                .requirements()
                .fields()
                .into_iter()
                .map(|(field, requirement)| FieldRule {
                    field,
                    requirement: requirement_str(requirement),
                })
                .collect(),
        })
        .collect();
    Json(kinds)
}

fn requirement_str(requirement: FieldRequirement) -> &'static str {
    match requirement {
        FieldRequirement::Required => "required",
        FieldRequirement::Optional => "optional",
        FieldRequirement::Forbidden => "forbidden",
    }
}

async fn submit_transaction(
    State(state): State<AppState>,
    Json(req): Json<SubmitTransactionRequest>,
) -> AppResult<(StatusCode, Json<TransactionReceiptResponse>)> {
    let kind = TransactionKind::from_str(&req.kind)?;
    let amount = Amount::from_str(&req.amount).map_err(LedgerError::Money)?;

    let mut draft = TransactionDraft::new(req.user_id, kind, amount);
    if let Some(id) = req.source_wallet {
        draft = draft.source_wallet(id);
    }
    if let Some(id) = req.destination_wallet {
        draft = draft.destination_wallet(id);
    }
    if let Some(id) = req.source_account {
        draft = draft.source_account(id);
    }
    if let Some(id) = req.destination_account {
        draft = draft.destination_account(id);
    }
    if let Some(id) = req.destination_deposit {
        draft = draft.destination_deposit(id);
    }
    if let Some(rate) = req.exchange_rate {
        draft = draft.exchange_rate(rate);
    }

    let receipt = state.applier.apply(draft.build()?).await?;
    if let Some(repo) = &state.repo {
        repo.record_applied(&state.ledger, &receipt).await?;
    }

    let response = TransactionReceiptResponse {
        transaction_id: receipt.transaction.id,
        code: receipt.code().to_string(),
        kind: receipt.transaction.kind.as_str().to_string(),
        amount: receipt.transaction.amount.value(),
        credited_amount: receipt.credited_amount,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Transaction>> {
    Ok(Json(state.ledger.transaction(id).await?))
}

// =========================================================================
// Entity endpoints
// =========================================================================

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.ledger.create_user(req.username).await;
    if let Some(repo) = &state.repo {
        repo.save_user(&user).await?;
    }
    Ok((StatusCode::CREATED, Json(user)))
}

async fn create_wallet(
    State(state): State<AppState>,
    Json(req): Json<CreateWalletRequest>,
) -> AppResult<(StatusCode, Json<Wallet>)> {
    let wallet = state
        .ledger
        .create_wallet(req.user_id, Currency::new(req.currency))
        .await?;
    if let Some(repo) = &state.repo {
        repo.save_wallet(&wallet).await?;
    }
    Ok((StatusCode::CREATED, Json(wallet)))
}

async fn get_wallet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Wallet>> {
    Ok(Json(state.ledger.wallet(id).await?))
}

async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> AppResult<(StatusCode, Json<Account>)> {
    let opened_on = req.opened_on.unwrap_or_else(|| Utc::now().date_naive());
    let account = state
        .ledger
        .create_account(
            req.user_id,
            req.name,
            req.account_type,
            Currency::new(req.currency),
            req.daily_profit_rate,
            opened_on,
        )
        .await?;
    if let Some(repo) = &state.repo {
        repo.save_account(&account).await?;
        // Base account assignment also touches the owner row.
        let user = state.ledger.user(req.user_id).await?;
        repo.save_user(&user).await?;
    }
    Ok((StatusCode::CREATED, Json(account)))
}

async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Account>> {
    Ok(Json(state.ledger.account(id).await?))
}

/// The accounts a user may legally plug into a transaction of the given
/// kind, split by role. Dropdown plumbing for the admin UI; read-only.
async fn lookup_accounts(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<AccountLookupResponse>> {
    state.ledger.user(query.user_id).await?;
    let kind = TransactionKind::from_str(&query.kind)?;

    let summaries: Vec<AccountSummary> = state
        .ledger
        .accounts_for_user(query.user_id)
        .await
        .into_iter()
        .map(|account| AccountSummary {
            id: account.id,
            name: account.name,
            account_type: account.account_type,
        })
        .collect();

    // System kinds are never caller-usable, so both lists stay empty.
    let requirements = kind.requirements();
    let usable = |requirement: FieldRequirement| {
        requirement != FieldRequirement::Forbidden && !kind.is_system_generated()
    };
    Ok(Json(AccountLookupResponse {
        source_accounts: if usable(requirements.source_account) {
            summaries.clone()
        } else {
            Vec::new()
        },
        destination_accounts: if usable(requirements.destination_account) {
            summaries
        } else {
            Vec::new()
        },
    }))
}

async fn create_deposit(
    State(state): State<AppState>,
    Json(req): Json<CreateDepositRequest>,
) -> AppResult<(StatusCode, Json<Deposit>)> {
    let opened_on = req.opened_on.unwrap_or_else(|| Utc::now().date_naive());
    let deposit = state
        .ledger
        .create_deposit(
            req.user_id,
            Currency::new(req.currency),
            req.annual_profit_rate,
            req.term_days,
            opened_on,
        )
        .await?;
    if let Some(repo) = &state.repo {
        repo.save_deposit(&deposit).await?;
    }
    Ok((StatusCode::CREATED, Json(deposit)))
}

async fn get_deposit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Deposit>> {
    Ok(Json(state.ledger.deposit(id).await?))
}

async fn close_deposit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<CloseDepositRequest>>,
) -> AppResult<Json<Deposit>> {
    let closed_on = body
        .and_then(|Json(req)| req.closed_on)
        .unwrap_or_else(|| Utc::now().date_naive());
    let deposit = state.ledger.close_deposit(id, closed_on).await?;
    if let Some(repo) = &state.repo {
        repo.save_deposit(&deposit).await?;
    }
    Ok(Json(deposit))
}

// =========================================================================
// Job triggers
// =========================================================================

async fn run_snapshot_job(
    State(state): State<AppState>,
    body: Option<Json<SnapshotJobRequest>>,
) -> AppResult<Json<SnapshotRunReport>> {
    let date = body
        .and_then(|Json(req)| req.date)
        .unwrap_or_else(|| Utc::now().date_naive());

    let report = state.snapshots.record_all(&state.ledger, date).await;

    if let Some(repo) = &state.repo {
        for account in state.ledger.accounts().await {
            if let Some(balance) = state.snapshots.balance_on(account.id, date).await {
                repo.record_snapshot(account.id, date, balance).await?;
            }
        }
    }
    Ok(Json(report))
}

async fn run_accrual_job(
    State(state): State<AppState>,
    body: Option<Json<AccrualJobRequest>>,
) -> AppResult<Json<AccrualReport>> {
    let as_of = body
        .and_then(|Json(req)| req.as_of)
        .unwrap_or_else(|| Utc::now().date_naive());

    let report = state.engine.accrue_all(as_of).await;

    if let Some(repo) = &state.repo {
        repo.sync_all(&state.ledger).await?;
    }
    Ok(Json(report))
}
