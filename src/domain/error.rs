//! Domain error types
//!
//! Pure domain errors that don't depend on infrastructure. Every failure
//! path in the core surfaces as one of these variants; nothing is
//! silently swallowed.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::kind::TransactionKind;
use super::money::MoneyError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// Unknown or unparsable transaction kind
    #[error("Invalid transaction kind: {0}")]
    InvalidTransactionKind(String),

    /// A field the kind requires was not supplied
    #[error("Missing required field '{field}' for kind '{kind}'")]
    MissingRequiredField {
        kind: TransactionKind,
        field: &'static str,
    },

    /// A field the kind forbids was supplied
    #[error("Field '{field}' is not allowed for kind '{kind}'")]
    ForbiddenField {
        kind: TransactionKind,
        field: &'static str,
    },

    /// Source and destination currencies differ where they must match.
    /// The field names avoid `source`, which thiserror reserves for the
    /// error cause.
    #[error("Currency mismatch: {source_currency} vs {destination_currency}")]
    CurrencyMismatch {
        source_currency: String,
        destination_currency: String,
    },

    /// Exchange rate absent, non-positive, or out of bounds
    #[error("Invalid exchange rate: {0}")]
    InvalidRate(String),

    /// Debited bucket cannot cover the transaction amount
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    /// Generated transaction code collided with an existing one
    #[error("Duplicate transaction code: {0}")]
    DuplicateCode(String),

    /// Code generation retries exhausted. Fatal integrity condition.
    #[error("Transaction code space exhausted")]
    CodeSpaceExhausted,

    /// A day in the requested snapshot range has no snapshot
    #[error("Snapshot gap for account {account_id} on {date}")]
    SnapshotGap {
        account_id: Uuid,
        date: chrono::NaiveDate,
    },

    /// A snapshot for this (account, date) already exists
    #[error("Duplicate snapshot for account {account_id} on {date}")]
    DuplicateSnapshot {
        account_id: Uuid,
        date: chrono::NaiveDate,
    },

    /// Snapshot date is not the current processing date
    #[error("Stale snapshot date {date} (processing date is {processing_date})")]
    StaleDate {
        date: chrono::NaiveDate,
        processing_date: chrono::NaiveDate,
    },

    /// Caller attempted to construct a system-generated kind
    #[error("Kind '{0}' is system-generated and cannot be submitted by callers")]
    SystemKindMisuse(TransactionKind),

    /// A source endpoint does not belong to the initiating user
    #[error("Endpoint '{field}' does not belong to user {user_id}")]
    EndpointNotOwned { user_id: Uuid, field: &'static str },

    /// Deposit profit has nowhere to go
    #[error("User {0} has no base account to receive deposit profit")]
    BaseAccountMissing(Uuid),

    /// A user owns exactly one base account
    #[error("User {0} already has a base account")]
    DuplicateBaseAccount(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Wallet not found: {0}")]
    WalletNotFound(Uuid),

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Deposit not found: {0}")]
    DepositNotFound(Uuid),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl LedgerError {
    /// Client errors: the request itself is wrong and a retry without
    /// changes will fail again.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransactionKind(_)
                | Self::MissingRequiredField { .. }
                | Self::ForbiddenField { .. }
                | Self::CurrencyMismatch { .. }
                | Self::InvalidRate(_)
                | Self::InsufficientBalance { .. }
                | Self::SystemKindMisuse(_)
                | Self::EndpointNotOwned { .. }
                | Self::Money(_)
        )
    }

    /// Integrity errors: the ledger needs operator attention.
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, Self::CodeSpaceExhausted)
    }
}
