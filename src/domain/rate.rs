//! Exchange rate resolution
//!
//! Rates always travel with the transaction; there is no market lookup.
//! Convention: a rate is the number of destination-currency units per
//! one source-currency unit, so `credited = amount * rate`.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::error::LedgerError;
use super::money::Currency;

/// Rate bounds carried over from the original validation rules.
const MIN_RATE: &str = "0.000001";
const MAX_RATE: &str = "999999999999.999999";

/// A validated exchange rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeRate(Decimal);

impl ExchangeRate {
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidRate(format!(
                "rate must be positive (got {value})"
            )));
        }
        let min = Decimal::from_str(MIN_RATE).expect("Invalid MIN_RATE constant");
        let max = Decimal::from_str(MAX_RATE).expect("Invalid MAX_RATE constant");
        if value < min {
            return Err(LedgerError::InvalidRate(format!(
                "rate {value} is below the minimum {MIN_RATE}"
            )));
        }
        if value > max {
            return Err(LedgerError::InvalidRate(format!(
                "rate {value} exceeds the maximum {MAX_RATE}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Convert an amount from the source currency into the destination
    /// currency.
    pub fn convert(&self, amount: Decimal) -> Decimal {
        amount * self.0
    }
}

/// Resolve the amount credited at the destination.
///
/// - currencies differ: a valid rate is mandatory
/// - currencies match: a supplied rate is rejected rather than ignored,
///   so a caller can never believe a conversion happened when none did
pub fn resolve_credit(
    amount: Decimal,
    rate: Option<Decimal>,
    source: &Currency,
    destination: &Currency,
) -> Result<Decimal, LedgerError> {
    match (rate, source == destination) {
        (None, true) => Ok(amount),
        (None, false) => Err(LedgerError::InvalidRate(format!(
            "rate required to convert {source} to {destination}"
        ))),
        (Some(_), true) => Err(LedgerError::InvalidRate(format!(
            "rate supplied for same-currency transfer ({source})"
        ))),
        (Some(value), false) => Ok(ExchangeRate::new(value)?.convert(amount)),
    }
}
