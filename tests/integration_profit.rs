//! Profit accrual integration tests
//!
//! End-to-end scenarios over the snapshot book and the accrual engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use finance_ledger::domain::{
    AccountType, Amount, Currency, TransactionDraft, TransactionKind,
};
use finance_ledger::ledger::{Applier, Ledger};
use finance_ledger::profit::{ProfitConfig, ProfitEngine};
use finance_ledger::snapshot::SnapshotBook;

mod common;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn snapshot_flat(
    book: &SnapshotBook,
    account_id: Uuid,
    balance: Decimal,
    from: NaiveDate,
    to: NaiveDate,
) {
    let mut day = from;
    while day <= to {
        book.record(account_id, day, balance, day).await.unwrap();
        day = day.succ_opt().unwrap();
    }
}

/// Daily compounding over a flat balance: B * ((1+r)^n - 1), computed
/// the same way the engine walks the series.
fn compounded(balance: Decimal, rate: Decimal, days: i64) -> Decimal {
    let mut accrued = Decimal::ZERO;
    for _ in 0..days {
        accrued += (balance + accrued) * rate;
    }
    accrued.round_dp(6)
}

struct Fixture {
    ledger: Ledger,
    snapshots: SnapshotBook,
    engine: ProfitEngine,
    applier: Applier,
    user: Uuid,
}

impl Fixture {
    async fn new() -> Self {
        let ledger = Ledger::new();
        let snapshots = SnapshotBook::new();
        let engine = ProfitEngine::new(ledger.clone(), snapshots.clone(), ProfitConfig::default());
        let applier = Applier::new(ledger.clone());
        let user = ledger.create_user("alice").await.id;
        Self {
            ledger,
            snapshots,
            engine,
            applier,
            user,
        }
    }

    async fn profit_account(&self, rate: Decimal, opened_on: NaiveDate) -> Uuid {
        self.ledger
            .create_account(
                self.user,
                "savings",
                AccountType::Ordinary,
                Currency::from("IRR"),
                rate,
                opened_on,
            )
            .await
            .unwrap()
            .id
    }

    async fn base_account(&self) -> Uuid {
        self.ledger
            .create_account(
                self.user,
                "base",
                AccountType::Base,
                Currency::from("IRR"),
                dec!(0),
                date(2024, 1, 1),
            )
            .await
            .unwrap()
            .id
    }

    async fn fund_account(&self, account: Uuid, balance: Decimal) {
        let tx = TransactionDraft::new(
            self.user,
            TransactionKind::CreditIncrease,
            Amount::new(balance).unwrap(),
        )
        .destination_account(account)
        .build()
        .unwrap();
        self.applier.apply(tx).await.unwrap();
    }

    async fn funded_deposit(
        &self,
        principal: Decimal,
        annual_rate: Decimal,
        term_days: i64,
        opened_on: NaiveDate,
    ) -> Uuid {
        let wallet = self
            .ledger
            .create_wallet(self.user, Currency::from("IRR"))
            .await
            .unwrap();
        let deposit = self
            .ledger
            .create_deposit(self.user, Currency::from("IRR"), annual_rate, term_days, opened_on)
            .await
            .unwrap();
        let fund = TransactionDraft::new(
            self.user,
            TransactionKind::AddToWallet,
            Amount::new(principal).unwrap(),
        )
        .destination_wallet(wallet.id)
        .build()
        .unwrap();
        self.applier.apply(fund).await.unwrap();
        let open = TransactionDraft::new(
            self.user,
            TransactionKind::WalletToDepositInitial,
            Amount::new(principal).unwrap(),
        )
        .source_wallet(wallet.id)
        .destination_deposit(deposit.id)
        .build()
        .unwrap();
        self.applier.apply(open).await.unwrap();
        deposit.id
    }
}

#[tokio::test]
async fn test_account_profit_over_28_days() {
    let fx = Fixture::new().await;
    let account = fx.profit_account(dec!(0.0003), date(2024, 1, 1)).await;
    fx.fund_account(account, dec!(1000000)).await;
    snapshot_flat(&fx.snapshots, account, dec!(1000000), date(2024, 1, 2), date(2024, 1, 29))
        .await;

    let report = fx.engine.accrue_all(date(2024, 1, 29)).await;
    assert_eq!(report.accounts_accrued, 1);
    assert!(report.failed.is_empty());

    let expected = compounded(dec!(1000000), dec!(0.0003), 28);
    let stored = fx.ledger.account(account).await.unwrap();
    assert_eq!(stored.balance.value(), dec!(1000000) + expected);

    assert_eq!(stored.last_accrual_on, Some(date(2024, 1, 29)));
}

#[tokio::test]
async fn test_profit_itself_compounds_across_cycles() {
    let fx = Fixture::new().await;
    let account = fx.profit_account(dec!(0.0003), date(2024, 1, 1)).await;
    fx.fund_account(account, dec!(1000000)).await;

    snapshot_flat(&fx.snapshots, account, dec!(1000000), date(2024, 1, 2), date(2024, 1, 29))
        .await;
    fx.engine.accrue_all(date(2024, 1, 29)).await;
    let first_cycle = fx.ledger.account(account).await.unwrap().balance.value();
    assert!(first_cycle > dec!(1000000));

    // Second cycle snapshots include the credited profit, so the second
    // payout is strictly larger than the first.
    snapshot_flat(&fx.snapshots, account, first_cycle, date(2024, 1, 30), date(2024, 2, 26))
        .await;
    fx.engine.accrue_all(date(2024, 2, 26)).await;
    let second_cycle = fx.ledger.account(account).await.unwrap().balance.value();

    let first_profit = first_cycle - dec!(1000000);
    let second_profit = second_cycle - first_cycle;
    assert!(second_profit > first_profit);
}

#[tokio::test]
async fn test_zero_balance_account_advances_marker_without_transaction() {
    let fx = Fixture::new().await;
    let account = fx.profit_account(dec!(0.0003), date(2024, 1, 1)).await;
    snapshot_flat(&fx.snapshots, account, dec!(0), date(2024, 1, 2), date(2024, 1, 29)).await;

    let report = fx.engine.accrue_all(date(2024, 1, 29)).await;
    assert_eq!(report.accounts_accrued, 1);
    assert!(report.failed.is_empty());

    let stored = fx.ledger.account(account).await.unwrap();
    assert_eq!(stored.balance.value(), dec!(0));
    assert_eq!(stored.last_accrual_on, Some(date(2024, 1, 29)));
}

#[tokio::test]
async fn test_deposit_profit_goes_to_base_account() {
    let fx = Fixture::new().await;
    let base = fx.base_account().await;
    let deposit = fx
        .funded_deposit(dec!(5000000), dec!(0.18), 365, date(2024, 1, 1))
        .await;

    let report = fx.engine.accrue_all(date(2024, 1, 31)).await;
    assert_eq!(report.deposits_accrued, 1);
    assert!(report.failed.is_empty());

    let expected = (dec!(5000000) * dec!(0.18) / dec!(365) * dec!(30)).round_dp(6);
    assert_eq!(
        fx.ledger.account(base).await.unwrap().balance.value(),
        expected
    );
    // Simple interest: the principal never grows.
    assert_eq!(
        fx.ledger.deposit(deposit).await.unwrap().principal.value(),
        dec!(5000000)
    );
}

#[tokio::test]
async fn test_accrual_gate_and_idempotency() {
    let fx = Fixture::new().await;
    let base = fx.base_account().await;
    fx.funded_deposit(dec!(5000000), dec!(0.18), 365, date(2024, 1, 1))
        .await;

    // Day 27: too soon.
    let early = fx.engine.accrue_all(date(2024, 1, 28)).await;
    assert_eq!(early.deposits_accrued, 0);
    assert_eq!(early.skipped_too_soon, 1);
    assert_eq!(
        fx.ledger.account(base).await.unwrap().balance.value(),
        dec!(0)
    );

    // Day 30: accrues once; an immediate rerun is gated again.
    fx.engine.accrue_all(date(2024, 1, 31)).await;
    let balance = fx.ledger.account(base).await.unwrap().balance.value();
    assert!(balance > dec!(0));

    let rerun = fx.engine.accrue_all(date(2024, 1, 31)).await;
    assert_eq!(rerun.deposits_accrued, 0);
    assert_eq!(
        fx.ledger.account(base).await.unwrap().balance.value(),
        balance
    );
}

#[tokio::test]
async fn test_breakage_floor_on_very_early_withdrawal() {
    let fx = Fixture::new().await;
    let base = fx.base_account().await;
    let deposit = fx
        .funded_deposit(dec!(1000000), dec!(0.18), 1000, date(2024, 1, 1))
        .await;

    // Withdrawn after 30 days of a 1000-day term: 3% elapsed, clamped up
    // to the 10% floor.
    fx.ledger
        .close_deposit(deposit, date(2024, 1, 31))
        .await
        .unwrap();

    let report = fx.engine.accrue_all(date(2024, 3, 1)).await;
    assert_eq!(report.deposits_accrued, 1);

    let full = dec!(1000000) * dec!(0.18) / dec!(365) * dec!(30);
    let expected = (full * dec!(0.1)).round_dp(6);
    assert_eq!(
        fx.ledger.account(base).await.unwrap().balance.value(),
        expected
    );
}

#[tokio::test]
async fn test_mixed_run_isolates_failures() {
    let fx = Fixture::new().await;

    // Healthy account with a full snapshot series.
    let healthy = fx.profit_account(dec!(0.0003), date(2024, 1, 1)).await;
    fx.fund_account(healthy, dec!(1000)).await;
    snapshot_flat(&fx.snapshots, healthy, dec!(1000), date(2024, 1, 2), date(2024, 1, 29)).await;

    // Deposit with no base account to receive its profit.
    let orphan = fx
        .funded_deposit(dec!(2000), dec!(0.18), 365, date(2024, 1, 1))
        .await;

    let report = fx.engine.accrue_all(date(2024, 1, 29)).await;
    assert_eq!(report.accounts_accrued, 1);
    assert_eq!(report.deposits_accrued, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].entity_id, orphan);

    let expected = compounded(dec!(1000), dec!(0.0003), 28);
    assert_eq!(
        fx.ledger.account(healthy).await.unwrap().balance.value(),
        dec!(1000) + expected
    );
}
