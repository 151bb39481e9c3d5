//! Daily balance snapshots
//!
//! End-of-day account balances, recorded once per account per day. The
//! profit engine reads these back as the compounding series, so the book
//! refuses stale dates and duplicates at write time and reports gaps at
//! read time instead of papering over them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::LedgerError;
use crate::ledger::Ledger;

/// Outcome of a snapshot run over the whole ledger.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotRunReport {
    pub recorded: usize,
    pub skipped: usize,
}

/// Per-account daily balance history.
#[derive(Clone, Default)]
pub struct SnapshotBook {
    inner: Arc<RwLock<HashMap<Uuid, BTreeMap<NaiveDate, Decimal>>>>,
}

impl SnapshotBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one account's end-of-day balance. `date` must equal the
    /// processing date: snapshots are observations of "now", never
    /// backfills.
    pub async fn record(
        &self,
        account_id: Uuid,
        date: NaiveDate,
        balance: Decimal,
        processing_date: NaiveDate,
    ) -> Result<(), LedgerError> {
        if date != processing_date {
            return Err(LedgerError::StaleDate {
                date,
                processing_date,
            });
        }

        let mut book = self.inner.write().await;
        let history = book.entry(account_id).or_default();
        if history.contains_key(&date) {
            return Err(LedgerError::DuplicateSnapshot { account_id, date });
        }
        history.insert(date, balance);
        Ok(())
    }

    /// Snapshot every account in the ledger for `date`. Accounts already
    /// snapshotted today are skipped, so the run is safe to repeat.
    pub async fn record_all(&self, ledger: &Ledger, date: NaiveDate) -> SnapshotRunReport {
        let mut report = SnapshotRunReport::default();

        for account in ledger.accounts().await {
            match self
                .record(account.id, date, account.balance.value(), date)
                .await
            {
                Ok(()) => report.recorded += 1,
                Err(LedgerError::DuplicateSnapshot { .. }) => report.skipped += 1,
                // Unreachable with date == processing_date, but a run
                // never aborts over one account.
                Err(error) => {
                    tracing::error!(account_id = %account.id, %error, "snapshot failed");
                }
            }
        }

        tracing::info!(
            %date,
            recorded = report.recorded,
            skipped = report.skipped,
            "snapshot run complete"
        );
        report
    }

    /// Reload a persisted snapshot at boot. Skips the stale-date and
    /// duplicate checks, which only apply to live observations.
    pub async fn restore(&self, account_id: Uuid, date: NaiveDate, balance: Decimal) {
        let mut book = self.inner.write().await;
        book.entry(account_id).or_default().insert(date, balance);
    }

    pub async fn balance_on(&self, account_id: Uuid, date: NaiveDate) -> Option<Decimal> {
        self.inner
            .read()
            .await
            .get(&account_id)
            .and_then(|history| history.get(&date).copied())
    }

    pub async fn latest(&self, account_id: Uuid) -> Option<(NaiveDate, Decimal)> {
        self.inner
            .read()
            .await
            .get(&account_id)
            .and_then(|history| history.iter().next_back().map(|(d, b)| (*d, *b)))
    }

    /// The balance series over `[from, to]` inclusive, one entry per day.
    /// Fails with `SnapshotGap` at the first missing day: a compounding
    /// window with holes cannot be accrued.
    pub async fn balances_in_range(
        &self,
        account_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal)>, LedgerError> {
        let book = self.inner.read().await;
        let history = book.get(&account_id);

        let mut series = Vec::new();
        let mut day = from;
        while day <= to {
            let balance = history
                .and_then(|h| h.get(&day).copied())
                .ok_or(LedgerError::SnapshotGap {
                    account_id,
                    date: day,
                })?;
            series.push((day, balance));
            day = day.succ_opt().ok_or(LedgerError::SnapshotGap {
                account_id,
                date: day,
            })?;
        }
        Ok(series)
    }
}
