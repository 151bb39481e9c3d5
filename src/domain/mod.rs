//! Domain module
//!
//! Pure domain types and business rules. No I/O lives here.

pub mod entities;
pub mod error;
pub mod kind;
pub mod money;
pub mod rate;
pub mod transaction;

pub use entities::{Account, AccountType, Deposit, User, Wallet};
pub use error::LedgerError;
pub use kind::{FieldRequirement, KindRequirements, TransactionKind};
pub use money::{Amount, Balance, Currency, MoneyError};
pub use rate::{resolve_credit, ExchangeRate};
pub use transaction::{BucketRef, Transaction, TransactionDraft};
