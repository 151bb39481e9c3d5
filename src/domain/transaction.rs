//! Transactions
//!
//! A transaction is the only thing allowed to move value between
//! buckets. Callers build one through [`TransactionDraft`], which
//! enforces the kind registry's shape rules; the applier is the single
//! gate that turns a validated transaction into balance mutations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::LedgerError;
use super::kind::{FieldRequirement, TransactionKind};
use super::money::Amount;

/// Stable identity of a balance bucket, used for canonical ordering of
/// debit checks and (in the Postgres path) row-lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BucketRef {
    Wallet(Uuid),
    Account(Uuid),
    Deposit(Uuid),
}

/// A movement of value under a fixed kind. Immutable once applied;
/// amendments require a new offsetting transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub source_wallet: Option<Uuid>,
    pub destination_wallet: Option<Uuid>,
    pub source_account: Option<Uuid>,
    pub destination_account: Option<Uuid>,
    pub destination_deposit: Option<Uuid>,
    pub amount: Amount,
    /// Destination-currency units per source-currency unit.
    pub exchange_rate: Option<Decimal>,
    /// Human-facing unique code, assigned by the applier.
    pub code: Option<String>,
    pub applied: bool,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Construct a system profit transaction. Only the accrual engine
    /// calls this; callers go through [`TransactionDraft`], which
    /// rejects system kinds.
    pub(crate) fn system_profit(
        kind: TransactionKind,
        user_id: Uuid,
        destination_account: Uuid,
        amount: Amount,
    ) -> Self {
        debug_assert!(kind.is_system_generated());
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            source_wallet: None,
            destination_wallet: None,
            source_account: None,
            destination_account: Some(destination_account),
            destination_deposit: None,
            amount,
            exchange_rate: None,
            code: None,
            applied: false,
            created_at: Utc::now(),
        }
    }

    /// Check endpoint presence against the kind registry. The
    /// currency-aware part of rate validation happens in the applier,
    /// where currencies are known; here an `Optional` rate passes.
    pub fn validate_shape(&self) -> Result<(), LedgerError> {
        let requirements = self.kind.requirements();
        let presence: [(&'static str, bool, FieldRequirement); 6] = [
            (
                "source_wallet",
                self.source_wallet.is_some(),
                requirements.source_wallet,
            ),
            (
                "destination_wallet",
                self.destination_wallet.is_some(),
                requirements.destination_wallet,
            ),
            (
                "source_account",
                self.source_account.is_some(),
                requirements.source_account,
            ),
            (
                "destination_account",
                self.destination_account.is_some(),
                requirements.destination_account,
            ),
            (
                "destination_deposit",
                self.destination_deposit.is_some(),
                requirements.destination_deposit,
            ),
            (
                "exchange_rate",
                self.exchange_rate.is_some(),
                requirements.exchange_rate,
            ),
        ];

        for (field, present, requirement) in presence {
            match requirement {
                FieldRequirement::Required if !present => {
                    return Err(LedgerError::MissingRequiredField {
                        kind: self.kind,
                        field,
                    });
                }
                FieldRequirement::Forbidden if present => {
                    return Err(LedgerError::ForbiddenField {
                        kind: self.kind,
                        field,
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Buckets this transaction debits.
    pub fn debited_buckets(&self) -> Vec<BucketRef> {
        let mut buckets = Vec::new();
        if let Some(id) = self.source_wallet {
            buckets.push(BucketRef::Wallet(id));
        }
        if let Some(id) = self.source_account {
            buckets.push(BucketRef::Account(id));
        }
        buckets.sort();
        buckets
    }

    /// Buckets this transaction credits.
    pub fn credited_buckets(&self) -> Vec<BucketRef> {
        let mut buckets = Vec::new();
        if let Some(id) = self.destination_wallet {
            buckets.push(BucketRef::Wallet(id));
        }
        if let Some(id) = self.destination_account {
            buckets.push(BucketRef::Account(id));
        }
        if let Some(id) = self.destination_deposit {
            buckets.push(BucketRef::Deposit(id));
        }
        buckets.sort();
        buckets
    }
}

/// Builder for caller-submitted transactions.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    user_id: Uuid,
    kind: TransactionKind,
    amount: Amount,
    source_wallet: Option<Uuid>,
    destination_wallet: Option<Uuid>,
    source_account: Option<Uuid>,
    destination_account: Option<Uuid>,
    destination_deposit: Option<Uuid>,
    exchange_rate: Option<Decimal>,
}

impl TransactionDraft {
    pub fn new(user_id: Uuid, kind: TransactionKind, amount: Amount) -> Self {
        Self {
            user_id,
            kind,
            amount,
            source_wallet: None,
            destination_wallet: None,
            source_account: None,
            destination_account: None,
            destination_deposit: None,
            exchange_rate: None,
        }
    }

    pub fn source_wallet(mut self, id: Uuid) -> Self {
        self.source_wallet = Some(id);
        self
    }

    pub fn destination_wallet(mut self, id: Uuid) -> Self {
        self.destination_wallet = Some(id);
        self
    }

    pub fn source_account(mut self, id: Uuid) -> Self {
        self.source_account = Some(id);
        self
    }

    pub fn destination_account(mut self, id: Uuid) -> Self {
        self.destination_account = Some(id);
        self
    }

    pub fn destination_deposit(mut self, id: Uuid) -> Self {
        self.destination_deposit = Some(id);
        self
    }

    pub fn exchange_rate(mut self, rate: Decimal) -> Self {
        self.exchange_rate = Some(rate);
        self
    }

    /// Validate the shape against the kind registry and produce the
    /// transaction. System-generated kinds are rejected here.
    pub fn build(self) -> Result<Transaction, LedgerError> {
        if self.kind.is_system_generated() {
            return Err(LedgerError::SystemKindMisuse(self.kind));
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            kind: self.kind,
            source_wallet: self.source_wallet,
            destination_wallet: self.destination_wallet,
            source_account: self.source_account,
            destination_account: self.destination_account,
            destination_deposit: self.destination_deposit,
            amount: self.amount,
            exchange_rate: self.exchange_rate,
            code: None,
            applied: false,
            created_at: Utc::now(),
        };

        transaction.validate_shape()?;
        Ok(transaction)
    }
}
