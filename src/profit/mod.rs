//! Profit accrual engine
//!
//! Periodically turns earned profit into applied transactions. Accounts
//! compound daily over their snapshot series; deposits earn simple
//! profit on the principal, paid into the owner's base account. Both
//! are gated on a minimum interval since the last accrual, and the
//! accrual marker makes each cycle idempotent.

pub mod breakage;

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    Account, Amount, Deposit, LedgerError, Transaction, TransactionKind,
};
use crate::ledger::{Applier, Ledger};
use crate::snapshot::SnapshotBook;

/// Profit is credited at this decimal precision.
const PROFIT_SCALE: u32 = 6;

#[derive(Debug, Clone)]
pub struct ProfitConfig {
    /// Minimum days between accruals for the same account or deposit.
    pub min_accrual_days: i64,
    /// Day-count convention denominator for deposit profit.
    pub year_length_days: i64,
    /// Lower bound for the early-withdrawal breakage coefficient.
    pub breakage_floor: Decimal,
}

impl Default for ProfitConfig {
    fn default() -> Self {
        Self {
            min_accrual_days: 28,
            year_length_days: 365,
            breakage_floor: Decimal::new(1, 1),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccrualFailure {
    pub entity_id: Uuid,
    pub error: String,
}

/// Outcome of one engine run. Failures are per-entity: one bad account
/// never blocks the rest of the book.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccrualReport {
    pub accounts_accrued: usize,
    pub deposits_accrued: usize,
    pub skipped_too_soon: usize,
    pub failed: Vec<AccrualFailure>,
}

#[derive(Clone)]
pub struct ProfitEngine {
    ledger: Ledger,
    snapshots: SnapshotBook,
    applier: Applier,
    config: ProfitConfig,
    /// Serializes engine runs; the scheduler and the manual trigger
    /// endpoint may fire concurrently.
    run_guard: Arc<Mutex<()>>,
}

impl ProfitEngine {
    pub fn new(ledger: Ledger, snapshots: SnapshotBook, config: ProfitConfig) -> Self {
        let applier = Applier::new(ledger.clone());
        Self {
            ledger,
            snapshots,
            applier,
            config,
            run_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &ProfitConfig {
        &self.config
    }

    /// Run accrual over every profit-bearing account and deposit.
    pub async fn accrue_all(&self, as_of: NaiveDate) -> AccrualReport {
        let _guard = self.run_guard.lock().await;
        let mut report = AccrualReport::default();

        for account in self.ledger.profit_bearing_accounts().await {
            match self.accrue_account(&account, as_of).await {
                Ok(Some(amount)) => {
                    report.accounts_accrued += 1;
                    tracing::info!(account_id = %account.id, %amount, "account profit accrued");
                }
                Ok(None) => report.skipped_too_soon += 1,
                Err(error) => {
                    tracing::warn!(account_id = %account.id, %error, "account accrual failed");
                    report.failed.push(AccrualFailure {
                        entity_id: account.id,
                        error: error.to_string(),
                    });
                }
            }
        }

        for deposit in self.ledger.profit_bearing_deposits().await {
            match self.accrue_deposit(&deposit, as_of).await {
                Ok(Some(amount)) => {
                    report.deposits_accrued += 1;
                    tracing::info!(deposit_id = %deposit.id, %amount, "deposit profit accrued");
                }
                Ok(None) => report.skipped_too_soon += 1,
                Err(error) => {
                    tracing::warn!(deposit_id = %deposit.id, %error, "deposit accrual failed");
                    report.failed.push(AccrualFailure {
                        entity_id: deposit.id,
                        error: error.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            %as_of,
            accounts = report.accounts_accrued,
            deposits = report.deposits_accrued,
            skipped = report.skipped_too_soon,
            failed = report.failed.len(),
            "accrual run complete"
        );
        report
    }

    /// Daily-compounded account profit over the snapshot series since
    /// the last accrual. Profit earned on day k itself earns profit on
    /// day k+1, so a flat balance B over n days yields B·((1+r)^n − 1).
    ///
    /// Returns `None` when the minimum interval has not elapsed.
    async fn accrue_account(
        &self,
        account: &Account,
        as_of: NaiveDate,
    ) -> Result<Option<Decimal>, LedgerError> {
        let marker = account.last_accrual_on.unwrap_or(account.opened_on);
        if (as_of - marker).num_days() < self.config.min_accrual_days {
            return Ok(None);
        }

        let from = marker.succ_opt().ok_or(LedgerError::SnapshotGap {
            account_id: account.id,
            date: marker,
        })?;
        let series = self
            .snapshots
            .balances_in_range(account.id, from, as_of)
            .await?;

        let mut accrued = Decimal::ZERO;
        for (_, balance) in &series {
            accrued += (*balance + accrued) * account.daily_profit_rate;
        }
        let accrued = accrued.round_dp(PROFIT_SCALE);

        // A zero-balance window still completes the cycle; the marker
        // advances so the gate restarts from today.
        if accrued > Decimal::ZERO {
            let transaction = Transaction::system_profit(
                TransactionKind::ProfitAccount,
                account.user_id,
                account.id,
                Amount::new(accrued)?,
            );
            self.applier.apply(transaction).await?;
        }
        self.ledger.advance_account_marker(account.id, as_of).await?;

        Ok(Some(accrued))
    }

    /// Simple (non-compounded) deposit profit on the principal, credited
    /// to the owner's base account. Early withdrawal scales the payout by
    /// the breakage coefficient.
    async fn accrue_deposit(
        &self,
        deposit: &Deposit,
        as_of: NaiveDate,
    ) -> Result<Option<Decimal>, LedgerError> {
        let marker = deposit.last_accrual_on.unwrap_or(deposit.opened_on);
        if (as_of - marker).num_days() < self.config.min_accrual_days {
            return Ok(None);
        }

        // Profit stops on the withdrawal date. A closed deposit whose
        // window has already been paid out is settled: skip it rather
        // than counting an empty accrual.
        let end = match deposit.closed_on {
            Some(closed) if closed < as_of => closed,
            _ => as_of,
        };
        let days = (end - marker).num_days();
        if days <= 0 {
            return Ok(None);
        }

        let base = self.ledger.base_account_of(deposit.user_id).await?;
        if base.currency != deposit.currency {
            return Err(LedgerError::CurrencyMismatch {
                source_currency: deposit.currency.to_string(),
                destination_currency: base.currency.to_string(),
            });
        }

        let mut profit = deposit.principal.value() * deposit.annual_profit_rate
            / Decimal::from(self.config.year_length_days)
            * Decimal::from(days);
        if deposit.closed_early() {
            if let Some(closed) = deposit.closed_on {
                let elapsed = (closed - deposit.opened_on).num_days();
                profit *= breakage::coefficient(
                    deposit.term_days,
                    elapsed,
                    self.config.breakage_floor,
                );
            }
        }
        let profit = profit.round_dp(PROFIT_SCALE);

        if profit > Decimal::ZERO {
            let transaction = Transaction::system_profit(
                TransactionKind::ProfitDeposit,
                deposit.user_id,
                base.id,
                Amount::new(profit)?,
            );
            self.applier.apply(transaction).await?;
        }
        self.ledger.advance_deposit_marker(deposit.id, as_of).await?;

        Ok(Some(profit))
    }
}
