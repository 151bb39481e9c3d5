//! Monetary primitives
//!
//! Domain types for currencies, amounts, and balances. Amounts are
//! validated at construction time so invalid values cannot exist in the
//! system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum representable amount
const MAX_AMOUNT: &str = "1000000000000";

/// Maximum decimal places carried on a monetary value
const MAX_SCALE: u32 = 6;

/// A currency tag (ISO-style code or internal code such as "IRR", "XAU").
///
/// Currencies are never converted implicitly; moving value between
/// buckets of different currencies requires an explicit exchange rate on
/// the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Errors raised when constructing monetary values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Balance must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

/// Amount represents a validated transaction amount.
///
/// # Invariants
/// - Value is strictly positive
/// - At most 6 decimal places
/// - Never exceeds [`MAX_AMOUNT`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

impl Amount {
    /// Create a new Amount with validation.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::NotPositive(value));
        }

        if value.scale() > MAX_SCALE {
            return Err(MoneyError::TooManyDecimals(value.scale()));
        }

        let max = Decimal::from_str(MAX_AMOUNT).expect("Invalid MAX_AMOUNT constant");
        if value > max {
            return Err(MoneyError::Overflow);
        }

        Ok(Self(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s).map_err(|e| MoneyError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<String> for Amount {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::from_str(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

/// Balance of a balance bucket (wallet, account, or deposit principal).
///
/// Unlike [`Amount`], a balance may be zero. It may never go negative:
/// the applier verifies sufficiency before every debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance(Decimal);

impl Balance {
    /// Create a new balance (zero or positive).
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value < Decimal::ZERO {
            return Err(MoneyError::Negative(value));
        }

        let max = Decimal::from_str(MAX_AMOUNT).expect("Invalid MAX_AMOUNT constant");
        if value > max {
            return Err(MoneyError::Overflow);
        }

        Ok(Self(value))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check whether the balance covers a debit of `amount`.
    pub fn is_sufficient_for(&self, amount: Decimal) -> bool {
        self.0 >= amount
    }

    /// Add to the balance, returning the new balance.
    pub fn credit(&self, amount: Decimal) -> Result<Balance, MoneyError> {
        Balance::new(self.0 + amount)
    }

    /// Subtract from the balance, returning the new balance.
    pub fn debit(&self, amount: Decimal) -> Result<Balance, MoneyError> {
        Balance::new(self.0 - amount)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(Decimal::new(100, 0));
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), Decimal::new(100, 0));
    }

    #[test]
    fn test_amount_zero_rejected() {
        assert!(matches!(
            Amount::new(Decimal::ZERO),
            Err(MoneyError::NotPositive(_))
        ));
    }

    #[test]
    fn test_amount_negative_rejected() {
        assert!(matches!(
            Amount::new(Decimal::new(-100, 0)),
            Err(MoneyError::NotPositive(_))
        ));
    }

    #[test]
    fn test_amount_too_many_decimals() {
        // 0.1234567 has 7 decimal places
        assert!(matches!(
            Amount::new(Decimal::new(1234567, 7)),
            Err(MoneyError::TooManyDecimals(7))
        ));
    }

    #[test]
    fn test_amount_max_decimals_ok() {
        assert!(Amount::new(Decimal::new(123456, 6)).is_ok());
    }

    #[test]
    fn test_amount_overflow() {
        let value = Decimal::from_str("1000000000001").unwrap();
        assert!(matches!(Amount::new(value), Err(MoneyError::Overflow)));
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Result<Amount, _> = "123.456".parse();
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), Decimal::new(123456, 3));
    }

    #[test]
    fn test_balance_credit_debit() {
        let balance = Balance::zero();
        let balance = balance.credit(Decimal::new(100, 0)).unwrap();
        assert_eq!(balance.value(), Decimal::new(100, 0));

        let balance = balance.debit(Decimal::new(30, 0)).unwrap();
        assert_eq!(balance.value(), Decimal::new(70, 0));
    }

    #[test]
    fn test_balance_never_negative() {
        let balance = Balance::new(Decimal::new(50, 0)).unwrap();
        assert!(!balance.is_sufficient_for(Decimal::new(100, 0)));
        assert!(matches!(
            balance.debit(Decimal::new(100, 0)),
            Err(MoneyError::Negative(_))
        ));
    }

    #[test]
    fn test_currency_normalized() {
        let c = Currency::new("irr");
        assert_eq!(c.as_str(), "IRR");
        assert_eq!(c, Currency::from("IRR"));
    }
}
