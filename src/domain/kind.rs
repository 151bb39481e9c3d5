//! Transaction kind registry
//!
//! The closed taxonomy of transaction kinds and, per kind, which
//! endpoints a transaction may carry. This table is the single
//! authoritative copy of the rule set: the validation path, the applier,
//! and the UI field-visibility endpoint all derive from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

/// The fixed set of transaction kinds.
///
/// Adding a kind is a compile-time-checked extension: every `match` over
/// this enum is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    AddToWallet,
    RemoveFromWallet,
    WalletToDepositInitial,
    AccountToWallet,
    WalletToAccount,
    WalletToWallet,
    AccountToAccount,
    CreditIncrease,
    WithdrawalRequest,
    AccountToDepositInitial,
    ProfitAccount,
    ProfitDeposit,
}

/// Whether an endpoint (or the exchange rate) may appear on a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRequirement {
    Required,
    /// Allowed; whether it is actually needed is decided by the
    /// currency-aware validator at validation time.
    Optional,
    Forbidden,
}

/// Per-kind endpoint policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindRequirements {
    pub source_wallet: FieldRequirement,
    pub destination_wallet: FieldRequirement,
    pub source_account: FieldRequirement,
    pub destination_account: FieldRequirement,
    pub destination_deposit: FieldRequirement,
    pub exchange_rate: FieldRequirement,
}

impl KindRequirements {
    const fn new(
        source_wallet: FieldRequirement,
        destination_wallet: FieldRequirement,
        source_account: FieldRequirement,
        destination_account: FieldRequirement,
        destination_deposit: FieldRequirement,
        exchange_rate: FieldRequirement,
    ) -> Self {
        Self {
            source_wallet,
            destination_wallet,
            source_account,
            destination_account,
            destination_deposit,
            exchange_rate,
        }
    }

    /// Iterate the endpoint fields by name, for generic validation.
    pub fn fields(&self) -> [(&'static str, FieldRequirement); 6] {
        [
            ("source_wallet", self.source_wallet),
            ("destination_wallet", self.destination_wallet),
            ("source_account", self.source_account),
            ("destination_account", self.destination_account),
            ("destination_deposit", self.destination_deposit),
            ("exchange_rate", self.exchange_rate),
        ]
    }
}

use FieldRequirement::{Forbidden, Optional, Required};

impl TransactionKind {
    /// Every kind, in declaration order. The set is closed.
    pub const ALL: [TransactionKind; 12] = [
        TransactionKind::AddToWallet,
        TransactionKind::RemoveFromWallet,
        TransactionKind::WalletToDepositInitial,
        TransactionKind::AccountToWallet,
        TransactionKind::WalletToAccount,
        TransactionKind::WalletToWallet,
        TransactionKind::AccountToAccount,
        TransactionKind::CreditIncrease,
        TransactionKind::WithdrawalRequest,
        TransactionKind::AccountToDepositInitial,
        TransactionKind::ProfitAccount,
        TransactionKind::ProfitDeposit,
    ];

    /// Endpoint policy for this kind.
    ///
    /// For the two profit kinds the destination account is required:
    /// the accrual engine must name a credit target even though callers
    /// never see these kinds (the visibility contract only exposes
    /// user-initiated kinds).
    pub const fn requirements(&self) -> KindRequirements {
        match self {
            TransactionKind::AddToWallet => KindRequirements::new(
                Forbidden, Required, Forbidden, Forbidden, Forbidden, Forbidden,
            ),
            TransactionKind::RemoveFromWallet => KindRequirements::new(
                Required, Forbidden, Forbidden, Forbidden, Forbidden, Forbidden,
            ),
            TransactionKind::WalletToDepositInitial => KindRequirements::new(
                Required, Forbidden, Forbidden, Forbidden, Required, Forbidden,
            ),
            TransactionKind::AccountToWallet => KindRequirements::new(
                Forbidden, Required, Required, Forbidden, Forbidden, Optional,
            ),
            TransactionKind::WalletToAccount => KindRequirements::new(
                Required, Forbidden, Forbidden, Required, Forbidden, Optional,
            ),
            TransactionKind::WalletToWallet => KindRequirements::new(
                Required, Required, Forbidden, Forbidden, Forbidden, Forbidden,
            ),
            TransactionKind::AccountToAccount => KindRequirements::new(
                Forbidden, Forbidden, Required, Required, Forbidden, Required,
            ),
            TransactionKind::CreditIncrease => KindRequirements::new(
                Forbidden, Forbidden, Forbidden, Required, Forbidden, Forbidden,
            ),
            TransactionKind::WithdrawalRequest => KindRequirements::new(
                Forbidden, Forbidden, Required, Forbidden, Forbidden, Forbidden,
            ),
            TransactionKind::AccountToDepositInitial => KindRequirements::new(
                Forbidden, Forbidden, Required, Forbidden, Required, Forbidden,
            ),
            TransactionKind::ProfitAccount => KindRequirements::new(
                Forbidden, Forbidden, Forbidden, Required, Forbidden, Forbidden,
            ),
            TransactionKind::ProfitDeposit => KindRequirements::new(
                Forbidden, Forbidden, Forbidden, Required, Forbidden, Forbidden,
            ),
        }
    }

    /// System-generated kinds are emitted only by the profit accrual
    /// engine; any caller-supplied transaction of such a kind is
    /// rejected with `SystemKindMisuse`.
    pub const fn is_system_generated(&self) -> bool {
        matches!(
            self,
            TransactionKind::ProfitAccount | TransactionKind::ProfitDeposit
        )
    }

    /// Kinds a caller may submit, in declaration order.
    pub fn user_initiated() -> impl Iterator<Item = TransactionKind> {
        Self::ALL.into_iter().filter(|k| !k.is_system_generated())
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::AddToWallet => "add_to_wallet",
            TransactionKind::RemoveFromWallet => "remove_from_wallet",
            TransactionKind::WalletToDepositInitial => "wallet_to_deposit_initial",
            TransactionKind::AccountToWallet => "account_to_wallet",
            TransactionKind::WalletToAccount => "wallet_to_account",
            TransactionKind::WalletToWallet => "wallet_to_wallet",
            TransactionKind::AccountToAccount => "account_to_account",
            TransactionKind::CreditIncrease => "credit_increase",
            TransactionKind::WithdrawalRequest => "withdrawal_request",
            TransactionKind::AccountToDepositInitial => "account_to_deposit_initial",
            TransactionKind::ProfitAccount => "profit_account",
            TransactionKind::ProfitDeposit => "profit_deposit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| LedgerError::InvalidTransactionKind(s.to_string()))
    }
}
