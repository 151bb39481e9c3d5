//! Transaction applier
//!
//! The single gate through which every balance change passes, whether
//! user-initiated or system-generated. Applies a transaction
//! all-or-nothing inside the store's write lock: validate shape, resolve
//! the cross-currency credit, verify every debit (in canonical bucket
//! order, debits strictly before credits), mutate, assign a code, mark
//! applied. Re-applying an already-applied transaction is a no-op
//! success so at-least-once callers stay safe.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{
    resolve_credit, Balance, BucketRef, ExchangeRate, LedgerError, Transaction, TransactionKind,
};

use super::code::next_code;
use super::store::{Ledger, LedgerState};

/// Receipt for a successfully applied transaction.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedTransaction {
    pub transaction: Transaction,
    /// Amount credited at the destination, after conversion.
    pub credited_amount: Decimal,
}

impl AppliedTransaction {
    pub fn code(&self) -> &str {
        self.transaction.code.as_deref().unwrap_or_default()
    }
}

/// Planned balance movements, computed before any mutation.
struct TransferPlan {
    debits: Vec<(BucketRef, Decimal)>,
    credits: Vec<(BucketRef, Decimal)>,
    credited_amount: Decimal,
}

#[derive(Clone)]
pub struct Applier {
    ledger: Ledger,
}

impl Applier {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Apply a transaction. Any failure leaves every balance untouched.
    pub async fn apply(
        &self,
        transaction: Transaction,
    ) -> Result<AppliedTransaction, LedgerError> {
        transaction.validate_shape()?;

        let mut state = self.ledger.write().await;

        // Idempotency on transaction identity: an already-applied
        // transaction returns its original receipt.
        if let Some(existing) = state.transactions.get(&transaction.id) {
            if existing.applied {
                let credited = existing
                    .exchange_rate
                    .map(|rate| existing.amount.value() * rate)
                    .unwrap_or_else(|| existing.amount.value());
                return Ok(AppliedTransaction {
                    transaction: existing.clone(),
                    credited_amount: credited,
                });
            }
        }

        let plan = plan_transfer(&state, &transaction)?;

        // Stage every post-transfer balance before touching state, debits
        // strictly before credits, in canonical bucket order. A debit that
        // cannot be covered or a credit that would push the destination
        // past the balance cap aborts here with nothing written.
        let mut staged: Vec<(BucketRef, Balance)> =
            Vec::with_capacity(plan.debits.len() + plan.credits.len());
        for (bucket, amount) in &plan.debits {
            let current = staged_balance(&staged, &state, *bucket)?;
            if !current.is_sufficient_for(*amount) {
                return Err(LedgerError::InsufficientBalance {
                    required: *amount,
                    available: current.value(),
                });
            }
            staged.push((*bucket, current.debit(*amount)?));
        }
        for (bucket, amount) in &plan.credits {
            let current = staged_balance(&staged, &state, *bucket)?;
            staged.push((*bucket, current.credit(*amount)?));
        }

        // The code is generated and registered before mutation so a
        // collision failure also leaves balances untouched.
        let code = next_code(|candidate| state.issued_codes.contains(candidate))?;
        state.register_code(&code)?;

        for (bucket, balance) in staged {
            set_bucket_balance(&mut state, bucket, balance)?;
        }

        let mut applied = transaction;
        applied.code = Some(code.clone());
        applied.applied = true;
        state.transactions.insert(applied.id, applied.clone());

        tracing::info!(
            code = %code,
            kind = %applied.kind,
            amount = %applied.amount,
            credited = %plan.credited_amount,
            "transaction applied"
        );

        Ok(AppliedTransaction {
            transaction: applied,
            credited_amount: plan.credited_amount,
        })
    }
}

/// Resolve endpoints, ownership, currencies, and the exchange rate into
/// concrete debit/credit movements. Read-only over the state.
fn plan_transfer(state: &LedgerState, tx: &Transaction) -> Result<TransferPlan, LedgerError> {
    let amount = tx.amount.value();

    let require = |field: &'static str, value: Option<uuid::Uuid>| {
        value.ok_or(LedgerError::MissingRequiredField {
            kind: tx.kind,
            field,
        })
    };

    let plan = match tx.kind {
        TransactionKind::AddToWallet => {
            let wallet = state.wallet(require("destination_wallet", tx.destination_wallet)?)?;
            TransferPlan {
                debits: vec![],
                credits: vec![(BucketRef::Wallet(wallet.id), amount)],
                credited_amount: amount,
            }
        }

        TransactionKind::RemoveFromWallet => {
            let wallet = state.wallet(require("source_wallet", tx.source_wallet)?)?;
            own(wallet.user_id, tx, "source_wallet")?;
            TransferPlan {
                debits: vec![(BucketRef::Wallet(wallet.id), amount)],
                credits: vec![],
                credited_amount: amount,
            }
        }

        TransactionKind::WalletToWallet => {
            let source = state.wallet(require("source_wallet", tx.source_wallet)?)?;
            let destination =
                state.wallet(require("destination_wallet", tx.destination_wallet)?)?;
            own(source.user_id, tx, "source_wallet")?;
            if source.currency != destination.currency {
                return Err(LedgerError::CurrencyMismatch {
                    source_currency: source.currency.to_string(),
                    destination_currency: destination.currency.to_string(),
                });
            }
            TransferPlan {
                debits: vec![(BucketRef::Wallet(source.id), amount)],
                credits: vec![(BucketRef::Wallet(destination.id), amount)],
                credited_amount: amount,
            }
        }

        TransactionKind::WalletToDepositInitial => {
            let wallet = state.wallet(require("source_wallet", tx.source_wallet)?)?;
            let deposit = state.deposit(require("destination_deposit", tx.destination_deposit)?)?;
            own(wallet.user_id, tx, "source_wallet")?;
            own(deposit.user_id, tx, "destination_deposit")?;
            if wallet.currency != deposit.currency {
                return Err(LedgerError::CurrencyMismatch {
                    source_currency: wallet.currency.to_string(),
                    destination_currency: deposit.currency.to_string(),
                });
            }
            TransferPlan {
                debits: vec![(BucketRef::Wallet(wallet.id), amount)],
                credits: vec![(BucketRef::Deposit(deposit.id), amount)],
                credited_amount: amount,
            }
        }

        TransactionKind::AccountToDepositInitial => {
            let account = state.account(require("source_account", tx.source_account)?)?;
            let deposit = state.deposit(require("destination_deposit", tx.destination_deposit)?)?;
            own(account.user_id, tx, "source_account")?;
            own(deposit.user_id, tx, "destination_deposit")?;
            if account.currency != deposit.currency {
                return Err(LedgerError::CurrencyMismatch {
                    source_currency: account.currency.to_string(),
                    destination_currency: deposit.currency.to_string(),
                });
            }
            TransferPlan {
                debits: vec![(BucketRef::Account(account.id), amount)],
                credits: vec![(BucketRef::Deposit(deposit.id), amount)],
                credited_amount: amount,
            }
        }

        TransactionKind::AccountToWallet => {
            let account = state.account(require("source_account", tx.source_account)?)?;
            let wallet = state.wallet(require("destination_wallet", tx.destination_wallet)?)?;
            own(account.user_id, tx, "source_account")?;
            let credited =
                resolve_credit(amount, tx.exchange_rate, &account.currency, &wallet.currency)?;
            TransferPlan {
                debits: vec![(BucketRef::Account(account.id), amount)],
                credits: vec![(BucketRef::Wallet(wallet.id), credited)],
                credited_amount: credited,
            }
        }

        TransactionKind::WalletToAccount => {
            let wallet = state.wallet(require("source_wallet", tx.source_wallet)?)?;
            let account = state.account(require("destination_account", tx.destination_account)?)?;
            own(wallet.user_id, tx, "source_wallet")?;
            let credited =
                resolve_credit(amount, tx.exchange_rate, &wallet.currency, &account.currency)?;
            TransferPlan {
                debits: vec![(BucketRef::Wallet(wallet.id), amount)],
                credits: vec![(BucketRef::Account(account.id), credited)],
                credited_amount: credited,
            }
        }

        TransactionKind::AccountToAccount => {
            let source = state.account(require("source_account", tx.source_account)?)?;
            let destination =
                state.account(require("destination_account", tx.destination_account)?)?;
            own(source.user_id, tx, "source_account")?;
            // Rate is unconditionally required for this kind; callers
            // pass 1 for same-currency moves.
            let rate = tx
                .exchange_rate
                .ok_or(LedgerError::MissingRequiredField {
                    kind: tx.kind,
                    field: "exchange_rate",
                })?;
            let credited = ExchangeRate::new(rate)?.convert(amount);
            TransferPlan {
                debits: vec![(BucketRef::Account(source.id), amount)],
                credits: vec![(BucketRef::Account(destination.id), credited)],
                credited_amount: credited,
            }
        }

        TransactionKind::CreditIncrease => {
            let account = state.account(require("destination_account", tx.destination_account)?)?;
            TransferPlan {
                debits: vec![],
                credits: vec![(BucketRef::Account(account.id), amount)],
                credited_amount: amount,
            }
        }

        TransactionKind::WithdrawalRequest => {
            let account = state.account(require("source_account", tx.source_account)?)?;
            own(account.user_id, tx, "source_account")?;
            TransferPlan {
                debits: vec![(BucketRef::Account(account.id), amount)],
                credits: vec![],
                credited_amount: amount,
            }
        }

        // System kinds: value enters from the system itself, so there is
        // no debited bucket.
        TransactionKind::ProfitAccount | TransactionKind::ProfitDeposit => {
            let account = state.account(require("destination_account", tx.destination_account)?)?;
            TransferPlan {
                debits: vec![],
                credits: vec![(BucketRef::Account(account.id), amount)],
                credited_amount: amount,
            }
        }
    };

    debug_assert!(plan.debits.windows(2).all(|w| w[0].0 <= w[1].0));
    Ok(plan)
}

fn own(
    owner: uuid::Uuid,
    tx: &Transaction,
    field: &'static str,
) -> Result<(), LedgerError> {
    if owner != tx.user_id {
        return Err(LedgerError::EndpointNotOwned {
            user_id: tx.user_id,
            field,
        });
    }
    Ok(())
}

fn bucket_balance(state: &LedgerState, bucket: BucketRef) -> Result<Balance, LedgerError> {
    Ok(match bucket {
        BucketRef::Wallet(id) => state.wallet(id)?.balance,
        BucketRef::Account(id) => state.account(id)?.balance,
        BucketRef::Deposit(id) => state.deposit(id)?.principal,
    })
}

/// The bucket's balance as already staged within this transfer, falling
/// back to the stored balance. Keeps a bucket that appears on both the
/// debit and credit side consistent.
fn staged_balance(
    staged: &[(BucketRef, Balance)],
    state: &LedgerState,
    bucket: BucketRef,
) -> Result<Balance, LedgerError> {
    match staged.iter().rev().find(|(b, _)| *b == bucket) {
        Some((_, balance)) => Ok(*balance),
        None => bucket_balance(state, bucket),
    }
}

fn set_bucket_balance(
    state: &mut LedgerState,
    bucket: BucketRef,
    balance: Balance,
) -> Result<(), LedgerError> {
    match bucket {
        BucketRef::Wallet(id) => {
            state
                .wallets
                .get_mut(&id)
                .ok_or(LedgerError::WalletNotFound(id))?
                .balance = balance;
        }
        BucketRef::Account(id) => {
            state
                .accounts
                .get_mut(&id)
                .ok_or(LedgerError::AccountNotFound(id))?
                .balance = balance;
        }
        BucketRef::Deposit(id) => {
            state
                .deposits
                .get_mut(&id)
                .ok_or(LedgerError::DepositNotFound(id))?
                .principal = balance;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountType, Amount, Currency, MoneyError, TransactionDraft};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn amount(v: Decimal) -> Amount {
        Amount::new(v).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn funded_wallet(ledger: &Ledger, user: Uuid, currency: &str, balance: Decimal) -> Uuid {
        let wallet = ledger
            .create_wallet(user, Currency::from(currency))
            .await
            .unwrap();
        let tx = TransactionDraft::new(user, TransactionKind::AddToWallet, amount(balance))
            .destination_wallet(wallet.id)
            .build()
            .unwrap();
        Applier::new(ledger.clone()).apply(tx).await.unwrap();
        wallet.id
    }

    #[tokio::test]
    async fn test_add_and_remove_from_wallet() {
        let ledger = Ledger::new();
        let applier = Applier::new(ledger.clone());
        let user = ledger.create_user("alice").await;
        let wallet_id = funded_wallet(&ledger, user.id, "IRR", dec!(1000)).await;

        let tx = TransactionDraft::new(
            user.id,
            TransactionKind::RemoveFromWallet,
            amount(dec!(400)),
        )
        .source_wallet(wallet_id)
        .build()
        .unwrap();
        let receipt = applier.apply(tx).await.unwrap();

        assert!(receipt.code().starts_with("TXN-"));
        assert_eq!(
            ledger.wallet(wallet_id).await.unwrap().balance.value(),
            dec!(600)
        );
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_state_untouched() {
        let ledger = Ledger::new();
        let applier = Applier::new(ledger.clone());
        let user = ledger.create_user("alice").await;
        let wallet_id = funded_wallet(&ledger, user.id, "IRR", dec!(100)).await;

        let tx = TransactionDraft::new(
            user.id,
            TransactionKind::RemoveFromWallet,
            amount(dec!(500)),
        )
        .source_wallet(wallet_id)
        .build()
        .unwrap();
        let tx_id = tx.id;
        let err = applier.apply(tx).await.unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(
            ledger.wallet(wallet_id).await.unwrap().balance.value(),
            dec!(100)
        );
        assert!(ledger.transaction(tx_id).await.is_err());
    }

    #[tokio::test]
    async fn test_reapply_is_noop_success() {
        let ledger = Ledger::new();
        let applier = Applier::new(ledger.clone());
        let user = ledger.create_user("alice").await;
        let wallet = ledger
            .create_wallet(user.id, Currency::from("IRR"))
            .await
            .unwrap();

        let tx = TransactionDraft::new(user.id, TransactionKind::AddToWallet, amount(dec!(250)))
            .destination_wallet(wallet.id)
            .build()
            .unwrap();

        let first = applier.apply(tx.clone()).await.unwrap();
        let second = applier.apply(tx).await.unwrap();

        assert_eq!(first.code(), second.code());
        assert_eq!(
            ledger.wallet(wallet.id).await.unwrap().balance.value(),
            dec!(250)
        );
    }

    #[tokio::test]
    async fn test_wallet_to_wallet_requires_same_currency() {
        let ledger = Ledger::new();
        let applier = Applier::new(ledger.clone());
        let alice = ledger.create_user("alice").await;
        let bob = ledger.create_user("bob").await;
        let source = funded_wallet(&ledger, alice.id, "IRR", dec!(1000)).await;
        let foreign = ledger
            .create_wallet(bob.id, Currency::from("USD"))
            .await
            .unwrap();

        let tx = TransactionDraft::new(
            alice.id,
            TransactionKind::WalletToWallet,
            amount(dec!(100)),
        )
        .source_wallet(source)
        .destination_wallet(foreign.id)
        .build()
        .unwrap();

        assert!(matches!(
            applier.apply(tx).await.unwrap_err(),
            LedgerError::CurrencyMismatch { .. }
        ));
    }

    #[tokio::test]
    async fn test_cross_user_wallet_transfer() {
        let ledger = Ledger::new();
        let applier = Applier::new(ledger.clone());
        let alice = ledger.create_user("alice").await;
        let bob = ledger.create_user("bob").await;
        let source = funded_wallet(&ledger, alice.id, "IRR", dec!(1000)).await;
        let destination = ledger
            .create_wallet(bob.id, Currency::from("IRR"))
            .await
            .unwrap();

        let tx = TransactionDraft::new(
            alice.id,
            TransactionKind::WalletToWallet,
            amount(dec!(300)),
        )
        .source_wallet(source)
        .destination_wallet(destination.id)
        .build()
        .unwrap();
        applier.apply(tx).await.unwrap();

        assert_eq!(
            ledger.wallet(source).await.unwrap().balance.value(),
            dec!(700)
        );
        assert_eq!(
            ledger.wallet(destination.id).await.unwrap().balance.value(),
            dec!(300)
        );
    }

    #[tokio::test]
    async fn test_source_must_belong_to_initiator() {
        let ledger = Ledger::new();
        let applier = Applier::new(ledger.clone());
        let alice = ledger.create_user("alice").await;
        let mallory = ledger.create_user("mallory").await;
        let wallet_id = funded_wallet(&ledger, alice.id, "IRR", dec!(1000)).await;

        let tx = TransactionDraft::new(
            mallory.id,
            TransactionKind::RemoveFromWallet,
            amount(dec!(10)),
        )
        .source_wallet(wallet_id)
        .build()
        .unwrap();

        assert!(matches!(
            applier.apply(tx).await.unwrap_err(),
            LedgerError::EndpointNotOwned { .. }
        ));
    }

    #[tokio::test]
    async fn test_wallet_to_deposit_initial_moves_principal() {
        let ledger = Ledger::new();
        let applier = Applier::new(ledger.clone());
        let user = ledger.create_user("alice").await;
        let wallet_id = funded_wallet(&ledger, user.id, "IRR", dec!(5000)).await;
        let deposit = ledger
            .create_deposit(user.id, Currency::from("IRR"), dec!(0.18), 365, date(2024, 1, 1))
            .await
            .unwrap();

        let tx = TransactionDraft::new(
            user.id,
            TransactionKind::WalletToDepositInitial,
            amount(dec!(5000)),
        )
        .source_wallet(wallet_id)
        .destination_deposit(deposit.id)
        .build()
        .unwrap();
        applier.apply(tx).await.unwrap();

        assert_eq!(
            ledger.wallet(wallet_id).await.unwrap().balance.value(),
            dec!(0)
        );
        assert_eq!(
            ledger.deposit(deposit.id).await.unwrap().principal.value(),
            dec!(5000)
        );
    }

    #[tokio::test]
    async fn test_wallet_to_account_cross_currency() {
        let ledger = Ledger::new();
        let applier = Applier::new(ledger.clone());
        let user = ledger.create_user("alice").await;
        let wallet_id = funded_wallet(&ledger, user.id, "IRR", dec!(840000)).await;
        let account = ledger
            .create_account(
                user.id,
                "usd savings",
                AccountType::Ordinary,
                Currency::from("USD"),
                dec!(0),
                date(2024, 1, 1),
            )
            .await
            .unwrap();

        // Without a rate: refused.
        let tx = TransactionDraft::new(
            user.id,
            TransactionKind::WalletToAccount,
            amount(dec!(840000)),
        )
        .source_wallet(wallet_id)
        .destination_account(account.id)
        .build()
        .unwrap();
        assert!(matches!(
            applier.apply(tx).await.unwrap_err(),
            LedgerError::InvalidRate(_)
        ));

        // With a rate: destination credit is amount * rate.
        let tx = TransactionDraft::new(
            user.id,
            TransactionKind::WalletToAccount,
            amount(dec!(840000)),
        )
        .source_wallet(wallet_id)
        .destination_account(account.id)
        .exchange_rate(dec!(0.000024))
        .build()
        .unwrap();
        let receipt = applier.apply(tx).await.unwrap();

        assert_eq!(receipt.credited_amount, dec!(20.16));
        assert_eq!(
            ledger.account(account.id).await.unwrap().balance.value(),
            dec!(20.16)
        );
        assert_eq!(
            ledger.wallet(wallet_id).await.unwrap().balance.value(),
            dec!(0)
        );
    }

    #[tokio::test]
    async fn test_failed_credit_leaves_all_balances_untouched() {
        let ledger = Ledger::new();
        let applier = Applier::new(ledger.clone());
        let alice = ledger.create_user("alice").await;
        let bob = ledger.create_user("bob").await;
        let source = funded_wallet(&ledger, alice.id, "IRR", dec!(100)).await;
        // Destination already at the balance cap, so the credit side
        // must fail after the debit side has been verified.
        let destination = funded_wallet(&ledger, bob.id, "IRR", dec!(1000000000000)).await;

        let tx = TransactionDraft::new(
            alice.id,
            TransactionKind::WalletToWallet,
            amount(dec!(100)),
        )
        .source_wallet(source)
        .destination_wallet(destination)
        .build()
        .unwrap();
        let tx_id = tx.id;
        let err = applier.apply(tx).await.unwrap_err();

        assert_eq!(err, LedgerError::Money(MoneyError::Overflow));
        assert_eq!(
            ledger.wallet(source).await.unwrap().balance.value(),
            dec!(100)
        );
        assert_eq!(
            ledger.wallet(destination).await.unwrap().balance.value(),
            dec!(1000000000000)
        );
        assert!(ledger.transaction(tx_id).await.is_err());
    }

    #[tokio::test]
    async fn test_code_space_exhausted_is_surfaced() {
        // Not reachable through the public applier without corrupting
        // the code space, so exercised directly at the generator seam.
        assert_eq!(
            next_code(|_| true).unwrap_err(),
            LedgerError::CodeSpaceExhausted
        );
    }
}
