//! Ledger entities
//!
//! Wallets, accounts, and deposits are pure data; every balance change
//! goes through the transaction applier. Profit bookkeeping state
//! (rates, accrual markers) lives on the entity it belongs to.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::{Balance, Currency};

/// A user owns wallets, accounts, and deposits. The base account is the
/// designated account that receives deposit profit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub base_account: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: Uuid, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            base_account: None,
            created_at: Utc::now(),
        }
    }
}

/// A currency-tagged balance bucket with no profit mechanics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency: Currency,
    pub balance: Balance,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(id: Uuid, user_id: Uuid, currency: Currency) -> Self {
        Self {
            id,
            user_id,
            currency,
            balance: Balance::zero(),
            created_at: Utc::now(),
        }
    }
}

/// Account classification. The base account receives deposit profit;
/// there is at most one per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Base,
    Ordinary,
}

/// An interest-bearing balance bucket, snapshotted daily so account
/// profit can compound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub account_type: AccountType,
    pub currency: Currency,
    pub balance: Balance,
    /// Periodic (daily) profit rate, e.g. 0.0003. Zero disables accrual.
    pub daily_profit_rate: Decimal,
    pub opened_on: NaiveDate,
    /// Idempotency marker for profit accrual.
    pub last_accrual_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        name: impl Into<String>,
        account_type: AccountType,
        currency: Currency,
        daily_profit_rate: Decimal,
        opened_on: NaiveDate,
    ) -> Self {
        Self {
            id,
            user_id,
            name: name.into(),
            account_type,
            currency,
            balance: Balance::zero(),
            daily_profit_rate,
            opened_on,
            last_accrual_on: None,
            created_at: Utc::now(),
        }
    }

    pub fn profit_enabled(&self) -> bool {
        self.daily_profit_rate > Decimal::ZERO
    }
}

/// A fixed-principal instrument earning simple (non-compounded) profit,
/// routed to the owning user's base account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency: Currency,
    /// Original principal; profit accrues on this, never on profit
    /// already paid out.
    pub principal: Balance,
    /// Annual profit rate, e.g. 0.18. Zero disables accrual.
    pub annual_profit_rate: Decimal,
    /// Agreed term in days from `opened_on` to maturity.
    pub term_days: i64,
    pub opened_on: NaiveDate,
    /// Set when the deposit is withdrawn; before `opened_on + term_days`
    /// this triggers the breakage adjustment.
    pub closed_on: Option<NaiveDate>,
    /// Idempotency marker for profit accrual.
    pub last_accrual_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Deposit {
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        currency: Currency,
        annual_profit_rate: Decimal,
        term_days: i64,
        opened_on: NaiveDate,
    ) -> Self {
        Self {
            id,
            user_id,
            currency,
            principal: Balance::zero(),
            annual_profit_rate,
            term_days,
            opened_on,
            closed_on: None,
            last_accrual_on: None,
            created_at: Utc::now(),
        }
    }

    pub fn profit_enabled(&self) -> bool {
        self.annual_profit_rate > Decimal::ZERO
    }

    pub fn maturity_date(&self) -> NaiveDate {
        self.opened_on + chrono::Duration::days(self.term_days)
    }

    /// A deposit closed strictly before maturity is subject to breakage.
    pub fn closed_early(&self) -> bool {
        match self.closed_on {
            Some(closed) => closed < self.maturity_date(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_account_profit_enabled() {
        let mut account = Account::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "savings",
            AccountType::Ordinary,
            Currency::from("IRR"),
            dec!(0.0003),
            date(2024, 1, 1),
        );
        assert!(account.profit_enabled());
        account.daily_profit_rate = Decimal::ZERO;
        assert!(!account.profit_enabled());
    }

    #[test]
    fn test_deposit_maturity_and_early_close() {
        let mut deposit = Deposit::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Currency::from("IRR"),
            dec!(0.18),
            365,
            date(2024, 1, 1),
        );
        assert_eq!(deposit.maturity_date(), date(2024, 12, 31));
        assert!(!deposit.closed_early());

        deposit.closed_on = Some(date(2024, 6, 1));
        assert!(deposit.closed_early());

        deposit.closed_on = Some(date(2024, 12, 31));
        assert!(!deposit.closed_early());
    }
}
