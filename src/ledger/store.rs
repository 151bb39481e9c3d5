//! Ledger store
//!
//! Holds wallets, accounts, deposits, and the transaction audit trail.
//! Pure data with no business rules: every balance mutation goes through
//! the applier, which takes the store's write lock as its exclusive-
//! access boundary. Thread-safe and cheap to clone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::domain::{
    Account, AccountType, Currency, Deposit, LedgerError, Transaction, User, Wallet,
};

/// The whole in-memory state of the ledger.
#[derive(Debug, Default)]
pub struct LedgerState {
    pub users: HashMap<Uuid, User>,
    pub wallets: HashMap<Uuid, Wallet>,
    pub accounts: HashMap<Uuid, Account>,
    pub deposits: HashMap<Uuid, Deposit>,
    /// Applied transactions, retained as the audit trail.
    pub transactions: HashMap<Uuid, Transaction>,
    /// Every code ever issued, for collision checks.
    pub issued_codes: HashSet<String>,
}

impl LedgerState {
    pub fn wallet(&self, id: Uuid) -> Result<&Wallet, LedgerError> {
        self.wallets.get(&id).ok_or(LedgerError::WalletNotFound(id))
    }

    pub fn account(&self, id: Uuid) -> Result<&Account, LedgerError> {
        self.accounts
            .get(&id)
            .ok_or(LedgerError::AccountNotFound(id))
    }

    pub fn deposit(&self, id: Uuid) -> Result<&Deposit, LedgerError> {
        self.deposits
            .get(&id)
            .ok_or(LedgerError::DepositNotFound(id))
    }

    pub fn user(&self, id: Uuid) -> Result<&User, LedgerError> {
        self.users.get(&id).ok_or(LedgerError::UserNotFound(id))
    }

    /// Register an issued transaction code. A code may only ever be
    /// issued once; a collision here means the generator was bypassed or
    /// the journal replayed a duplicate row.
    pub fn register_code(&mut self, code: &str) -> Result<(), LedgerError> {
        if !self.issued_codes.insert(code.to_string()) {
            return Err(LedgerError::DuplicateCode(code.to_string()));
        }
        Ok(())
    }
}

/// Handle to the shared ledger state.
#[derive(Clone, Default)]
pub struct Ledger {
    state: Arc<RwLock<LedgerState>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the ledger from persisted state (boot-time load).
    pub fn from_state(state: LedgerState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().await
    }

    // -------------------------------------------------------------------
    // Entity registration (outside the transactional core; balances all
    // start at zero and are only ever moved by applied transactions)
    // -------------------------------------------------------------------

    pub async fn create_user(&self, username: impl Into<String>) -> User {
        let user = User::new(Uuid::new_v4(), username);
        let mut state = self.state.write().await;
        state.users.insert(user.id, user.clone());
        user
    }

    pub async fn create_wallet(
        &self,
        user_id: Uuid,
        currency: Currency,
    ) -> Result<Wallet, LedgerError> {
        let mut state = self.state.write().await;
        state.user(user_id)?;
        let wallet = Wallet::new(Uuid::new_v4(), user_id, currency);
        state.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    pub async fn create_account(
        &self,
        user_id: Uuid,
        name: impl Into<String>,
        account_type: AccountType,
        currency: Currency,
        daily_profit_rate: Decimal,
        opened_on: NaiveDate,
    ) -> Result<Account, LedgerError> {
        let mut state = self.state.write().await;
        let user = state.user(user_id)?;
        if account_type == AccountType::Base && user.base_account.is_some() {
            return Err(LedgerError::DuplicateBaseAccount(user_id));
        }

        let account = Account::new(
            Uuid::new_v4(),
            user_id,
            name,
            account_type,
            currency,
            daily_profit_rate,
            opened_on,
        );
        if account_type == AccountType::Base {
            if let Some(user) = state.users.get_mut(&user_id) {
                user.base_account = Some(account.id);
            }
        }
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    pub async fn create_deposit(
        &self,
        user_id: Uuid,
        currency: Currency,
        annual_profit_rate: Decimal,
        term_days: i64,
        opened_on: NaiveDate,
    ) -> Result<Deposit, LedgerError> {
        let mut state = self.state.write().await;
        state.user(user_id)?;
        let deposit = Deposit::new(
            Uuid::new_v4(),
            user_id,
            currency,
            annual_profit_rate,
            term_days,
            opened_on,
        );
        state.deposits.insert(deposit.id, deposit.clone());
        Ok(deposit)
    }

    // -------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------

    pub async fn user(&self, id: Uuid) -> Result<User, LedgerError> {
        self.state.read().await.user(id).cloned()
    }

    pub async fn wallet(&self, id: Uuid) -> Result<Wallet, LedgerError> {
        self.state.read().await.wallet(id).cloned()
    }

    pub async fn account(&self, id: Uuid) -> Result<Account, LedgerError> {
        self.state.read().await.account(id).cloned()
    }

    pub async fn deposit(&self, id: Uuid) -> Result<Deposit, LedgerError> {
        self.state.read().await.deposit(id).cloned()
    }

    pub async fn transaction(&self, id: Uuid) -> Result<Transaction, LedgerError> {
        self.state
            .read()
            .await
            .transactions
            .get(&id)
            .cloned()
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    pub async fn accounts_for_user(&self, user_id: Uuid) -> Vec<Account> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        accounts
    }

    /// All accounts, for daily snapshotting.
    pub async fn accounts(&self) -> Vec<Account> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.id);
        accounts
    }

    /// Accounts eligible for profit accrual.
    pub async fn profit_bearing_accounts(&self) -> Vec<Account> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.profit_enabled())
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        accounts
    }

    /// Deposits eligible for profit accrual.
    pub async fn profit_bearing_deposits(&self) -> Vec<Deposit> {
        let state = self.state.read().await;
        let mut deposits: Vec<Deposit> = state
            .deposits
            .values()
            .filter(|d| d.profit_enabled())
            .cloned()
            .collect();
        deposits.sort_by_key(|d| d.id);
        deposits
    }

    /// The account designated to receive the user's deposit profit.
    pub async fn base_account_of(&self, user_id: Uuid) -> Result<Account, LedgerError> {
        let state = self.state.read().await;
        let user = state.user(user_id)?;
        let base_id = user
            .base_account
            .ok_or(LedgerError::BaseAccountMissing(user_id))?;
        state.account(base_id).cloned()
    }

    // -------------------------------------------------------------------
    // Accrual bookkeeping
    // -------------------------------------------------------------------

    pub async fn advance_account_marker(
        &self,
        account_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        account.last_accrual_on = Some(as_of);
        Ok(())
    }

    pub async fn advance_deposit_marker(
        &self,
        deposit_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        let deposit = state
            .deposits
            .get_mut(&deposit_id)
            .ok_or(LedgerError::DepositNotFound(deposit_id))?;
        deposit.last_accrual_on = Some(as_of);
        Ok(())
    }

    /// Mark a deposit withdrawn as of `closed_on`. Closing before
    /// maturity subjects its next accrual to breakage.
    pub async fn close_deposit(
        &self,
        deposit_id: Uuid,
        closed_on: NaiveDate,
    ) -> Result<Deposit, LedgerError> {
        let mut state = self.state.write().await;
        let deposit = state
            .deposits
            .get_mut(&deposit_id)
            .ok_or(LedgerError::DepositNotFound(deposit_id))?;
        deposit.closed_on = Some(closed_on);
        Ok(deposit.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_entity_registration() {
        let ledger = Ledger::new();
        let user = ledger.create_user("alice").await;
        let wallet = ledger
            .create_wallet(user.id, Currency::from("IRR"))
            .await
            .unwrap();

        assert_eq!(ledger.wallet(wallet.id).await.unwrap().user_id, user.id);
        assert!(matches!(
            ledger.wallet(Uuid::new_v4()).await,
            Err(LedgerError::WalletNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_single_base_account_per_user() {
        let ledger = Ledger::new();
        let user = ledger.create_user("bob").await;

        let base = ledger
            .create_account(
                user.id,
                "base",
                AccountType::Base,
                Currency::from("IRR"),
                dec!(0),
                date(2024, 1, 1),
            )
            .await
            .unwrap();

        assert_eq!(ledger.user(user.id).await.unwrap().base_account, Some(base.id));
        assert_eq!(ledger.base_account_of(user.id).await.unwrap().id, base.id);

        let err = ledger
            .create_account(
                user.id,
                "second base",
                AccountType::Base,
                Currency::from("IRR"),
                dec!(0),
                date(2024, 1, 1),
            )
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::DuplicateBaseAccount(user.id));
    }

    #[tokio::test]
    async fn test_base_account_missing() {
        let ledger = Ledger::new();
        let user = ledger.create_user("carol").await;
        assert_eq!(
            ledger.base_account_of(user.id).await.unwrap_err(),
            LedgerError::BaseAccountMissing(user.id)
        );
    }

    #[test]
    fn test_register_code_rejects_duplicates() {
        let mut state = LedgerState::default();
        state.register_code("TXN-AAAA222222").unwrap();
        assert_eq!(
            state.register_code("TXN-AAAA222222").unwrap_err(),
            LedgerError::DuplicateCode("TXN-AAAA222222".to_string())
        );
    }

    #[tokio::test]
    async fn test_profit_bearing_filters() {
        let ledger = Ledger::new();
        let user = ledger.create_user("dave").await;
        ledger
            .create_account(
                user.id,
                "idle",
                AccountType::Ordinary,
                Currency::from("IRR"),
                dec!(0),
                date(2024, 1, 1),
            )
            .await
            .unwrap();
        ledger
            .create_account(
                user.id,
                "earning",
                AccountType::Ordinary,
                Currency::from("IRR"),
                dec!(0.0003),
                date(2024, 1, 1),
            )
            .await
            .unwrap();

        assert_eq!(ledger.accounts().await.len(), 2);
        assert_eq!(ledger.profit_bearing_accounts().await.len(), 1);
    }
}
