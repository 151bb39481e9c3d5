//! Scheduled Jobs
//!
//! Background loop that snapshots account balances and runs profit
//! accrual. The manual job endpoints share the same code paths, so a
//! missed tick can always be caught up by hand.

use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;

use crate::api::AppState;

/// Periodic snapshot + accrual driver.
pub struct AccrualScheduler {
    state: AppState,
    tick: Duration,
}

impl AccrualScheduler {
    pub fn new(state: AppState, tick: Duration) -> Self {
        Self { state, tick }
    }

    /// Start the scheduler in the background.
    /// Returns a handle that can be used to abort it.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(tick_secs = self.tick.as_secs(), "Accrual scheduler started");
            let mut ticker = interval(self.tick);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }

    /// One scheduler cycle: snapshot every account for today, then run
    /// accrual. Both steps are idempotent within a day.
    pub async fn run_once(&self) {
        let today = Utc::now().date_naive();

        let snapshots = self
            .state
            .snapshots
            .record_all(&self.state.ledger, today)
            .await;
        let accrual = self.state.engine.accrue_all(today).await;

        if let Some(repo) = &self.state.repo {
            for account in self.state.ledger.accounts().await {
                if let Some(balance) = self.state.snapshots.balance_on(account.id, today).await {
                    if let Err(error) = repo.record_snapshot(account.id, today, balance).await {
                        tracing::error!(%error, "Failed to journal snapshot");
                    }
                }
            }
            if let Err(error) = repo.sync_all(&self.state.ledger).await {
                tracing::error!(%error, "Failed to journal accrual run");
            }
        }

        tracing::info!(
            %today,
            snapshots_recorded = snapshots.recorded,
            accounts_accrued = accrual.accounts_accrued,
            deposits_accrued = accrual.deposits_accrued,
            "Scheduler cycle complete"
        );
    }
}
