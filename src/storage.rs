//! Postgres persistence
//!
//! The in-memory ledger is authoritative at runtime; this module
//! journals every entity and applied transaction to Postgres and
//! reloads them at boot. All queries are plain runtime-bound SQL.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{
    Account, AccountType, Amount, Balance, Currency, Deposit, LedgerError, Transaction,
    TransactionKind, User, Wallet,
};
use crate::error::{AppError, AppResult};
use crate::ledger::{AppliedTransaction, Ledger, LedgerState};
use crate::snapshot::SnapshotBook;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    username TEXT NOT NULL,
    base_account UUID,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS wallets (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id),
    currency TEXT NOT NULL,
    balance NUMERIC(30, 6) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id),
    name TEXT NOT NULL,
    account_type TEXT NOT NULL,
    currency TEXT NOT NULL,
    balance NUMERIC(30, 6) NOT NULL,
    daily_profit_rate NUMERIC(12, 8) NOT NULL,
    opened_on DATE NOT NULL,
    last_accrual_on DATE,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS deposits (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id),
    currency TEXT NOT NULL,
    principal NUMERIC(30, 6) NOT NULL,
    annual_profit_rate NUMERIC(12, 8) NOT NULL,
    term_days BIGINT NOT NULL,
    opened_on DATE NOT NULL,
    closed_on DATE,
    last_accrual_on DATE,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    kind TEXT NOT NULL,
    source_wallet UUID,
    destination_wallet UUID,
    source_account UUID,
    destination_account UUID,
    destination_deposit UUID,
    amount NUMERIC(30, 6) NOT NULL,
    exchange_rate NUMERIC(20, 6),
    code TEXT NOT NULL UNIQUE,
    applied BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_balance_snapshots (
    account_id UUID NOT NULL,
    snapshot_date DATE NOT NULL,
    balance NUMERIC(30, 6) NOT NULL,
    PRIMARY KEY (account_id, snapshot_date)
);
"#;

/// Postgres journal behind the in-memory ledger.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Boot-time load
    // ---------------------------------------------------------------------

    /// Rebuild the full in-memory state from the journal.
    pub async fn load_state(&self) -> AppResult<LedgerState> {
        let mut state = LedgerState::default();

        for row in sqlx::query("SELECT * FROM users").fetch_all(&self.pool).await? {
            let user = User {
                id: row.try_get("id")?,
                username: row.try_get("username")?,
                base_account: row.try_get("base_account")?,
                created_at: row.try_get("created_at")?,
            };
            state.users.insert(user.id, user);
        }

        for row in sqlx::query("SELECT * FROM wallets").fetch_all(&self.pool).await? {
            let wallet = Wallet {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                currency: Currency::new(row.try_get::<String, _>("currency")?),
                balance: Balance::new(row.try_get("balance")?).map_err(LedgerError::Money)?,
                created_at: row.try_get("created_at")?,
            };
            state.wallets.insert(wallet.id, wallet);
        }

        for row in sqlx::query("SELECT * FROM accounts").fetch_all(&self.pool).await? {
            let account = Account {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                name: row.try_get("name")?,
                account_type: parse_account_type(&row.try_get::<String, _>("account_type")?)?,
                currency: Currency::new(row.try_get::<String, _>("currency")?),
                balance: Balance::new(row.try_get("balance")?).map_err(LedgerError::Money)?,
                daily_profit_rate: row.try_get("daily_profit_rate")?,
                opened_on: row.try_get("opened_on")?,
                last_accrual_on: row.try_get("last_accrual_on")?,
                created_at: row.try_get("created_at")?,
            };
            state.accounts.insert(account.id, account);
        }

        for row in sqlx::query("SELECT * FROM deposits").fetch_all(&self.pool).await? {
            let deposit = Deposit {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                currency: Currency::new(row.try_get::<String, _>("currency")?),
                principal: Balance::new(row.try_get("principal")?).map_err(LedgerError::Money)?,
                annual_profit_rate: row.try_get("annual_profit_rate")?,
                term_days: row.try_get("term_days")?,
                opened_on: row.try_get("opened_on")?,
                closed_on: row.try_get("closed_on")?,
                last_accrual_on: row.try_get("last_accrual_on")?,
                created_at: row.try_get("created_at")?,
            };
            state.deposits.insert(deposit.id, deposit);
        }

        for row in sqlx::query("SELECT * FROM transactions").fetch_all(&self.pool).await? {
            let kind = TransactionKind::from_str(&row.try_get::<String, _>("kind")?)?;
            let code: String = row.try_get("code")?;
            let transaction = Transaction {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                kind,
                source_wallet: row.try_get("source_wallet")?,
                destination_wallet: row.try_get("destination_wallet")?,
                source_account: row.try_get("source_account")?,
                destination_account: row.try_get("destination_account")?,
                destination_deposit: row.try_get("destination_deposit")?,
                amount: Amount::new(row.try_get("amount")?).map_err(LedgerError::Money)?,
                exchange_rate: row.try_get("exchange_rate")?,
                code: Some(code.clone()),
                applied: row.try_get("applied")?,
                created_at: row.try_get("created_at")?,
            };
            state.register_code(&code).map_err(AppError::Ledger)?;
            state.transactions.insert(transaction.id, transaction);
        }

        tracing::info!(
            users = state.users.len(),
            wallets = state.wallets.len(),
            accounts = state.accounts.len(),
            deposits = state.deposits.len(),
            transactions = state.transactions.len(),
            "ledger state loaded from database"
        );
        Ok(state)
    }

    /// Reload persisted snapshots into the book.
    pub async fn load_snapshots(&self, book: &SnapshotBook) -> AppResult<()> {
        let rows = sqlx::query("SELECT account_id, snapshot_date, balance FROM daily_balance_snapshots")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            book.restore(
                row.try_get("account_id")?,
                row.try_get("snapshot_date")?,
                row.try_get("balance")?,
            )
            .await;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Entity upserts
    // ---------------------------------------------------------------------

    pub async fn save_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, base_account, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET username = $2, base_account = $3
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.base_account)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_wallet(&self, wallet: &Wallet) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, currency, balance, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET balance = $4
            "#,
        )
        .bind(wallet.id)
        .bind(wallet.user_id)
        .bind(wallet.currency.as_str())
        .bind(wallet.balance.value())
        .bind(wallet.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_account(&self, account: &Account) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO accounts
                (id, user_id, name, account_type, currency, balance,
                 daily_profit_rate, opened_on, last_accrual_on, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET balance = $6, last_accrual_on = $9
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(&account.name)
        .bind(account_type_str(account.account_type))
        .bind(account.currency.as_str())
        .bind(account.balance.value())
        .bind(account.daily_profit_rate)
        .bind(account.opened_on)
        .bind(account.last_accrual_on)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_deposit(&self, deposit: &Deposit) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO deposits
                (id, user_id, currency, principal, annual_profit_rate,
                 term_days, opened_on, closed_on, last_accrual_on, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE
                SET principal = $4, closed_on = $8, last_accrual_on = $9
            "#,
        )
        .bind(deposit.id)
        .bind(deposit.user_id)
        .bind(deposit.currency.as_str())
        .bind(deposit.principal.value())
        .bind(deposit.annual_profit_rate)
        .bind(deposit.term_days)
        .bind(deposit.opened_on)
        .bind(deposit.closed_on)
        .bind(deposit.last_accrual_on)
        .bind(deposit.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Journal writes
    // ---------------------------------------------------------------------

    pub async fn record_snapshot(
        &self,
        account_id: Uuid,
        date: NaiveDate,
        balance: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO daily_balance_snapshots (account_id, snapshot_date, balance)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id, snapshot_date) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(date)
        .bind(balance)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_transaction(&self, transaction: &Transaction) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, user_id, kind, source_wallet, destination_wallet,
                 source_account, destination_account, destination_deposit,
                 amount, exchange_rate, code, applied, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.user_id)
        .bind(transaction.kind.as_str())
        .bind(transaction.source_wallet)
        .bind(transaction.destination_wallet)
        .bind(transaction.source_account)
        .bind(transaction.destination_account)
        .bind(transaction.destination_deposit)
        .bind(transaction.amount.value())
        .bind(transaction.exchange_rate)
        .bind(transaction.code.as_deref().unwrap_or_default())
        .bind(transaction.applied)
        .bind(transaction.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Bring the journal up to date with the whole in-memory state.
    /// Used after an accrual run, which may touch many buckets and mint
    /// many system transactions at once.
    pub async fn sync_all(&self, ledger: &Ledger) -> AppResult<()> {
        let (users, wallets, accounts, deposits, transactions) = {
            let state = ledger.read().await;
            (
                state.users.values().cloned().collect::<Vec<_>>(),
                state.wallets.values().cloned().collect::<Vec<_>>(),
                state.accounts.values().cloned().collect::<Vec<_>>(),
                state.deposits.values().cloned().collect::<Vec<_>>(),
                state.transactions.values().cloned().collect::<Vec<_>>(),
            )
        };

        for user in &users {
            self.save_user(user).await?;
        }
        for wallet in &wallets {
            self.save_wallet(wallet).await?;
        }
        for account in &accounts {
            self.save_account(account).await?;
        }
        for deposit in &deposits {
            self.save_deposit(deposit).await?;
        }
        for transaction in &transactions {
            self.record_transaction(transaction).await?;
        }
        Ok(())
    }

    /// Journal an applied transaction and the buckets it touched.
    pub async fn record_applied(
        &self,
        ledger: &Ledger,
        receipt: &AppliedTransaction,
    ) -> AppResult<()> {
        let tx = &receipt.transaction;
        self.record_transaction(tx).await?;

        for wallet_id in [tx.source_wallet, tx.destination_wallet].into_iter().flatten() {
            let wallet = ledger.wallet(wallet_id).await?;
            self.save_wallet(&wallet).await?;
        }
        for account_id in [tx.source_account, tx.destination_account]
            .into_iter()
            .flatten()
        {
            let account = ledger.account(account_id).await?;
            self.save_account(&account).await?;
        }
        if let Some(deposit_id) = tx.destination_deposit {
            let deposit = ledger.deposit(deposit_id).await?;
            self.save_deposit(&deposit).await?;
        }
        Ok(())
    }
}

fn account_type_str(account_type: AccountType) -> &'static str {
    match account_type {
        AccountType::Base => "base",
        AccountType::Ordinary => "ordinary",
    }
}

fn parse_account_type(raw: &str) -> AppResult<AccountType> {
    match raw {
        "base" => Ok(AccountType::Base),
        "ordinary" => Ok(AccountType::Ordinary),
        other => Err(AppError::Internal(format!(
            "unknown account type in database: {other}"
        ))),
    }
}
