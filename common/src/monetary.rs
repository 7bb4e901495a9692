//! Monetary types for BankLedger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// Largest number of fractional digits an amount may carry by default.
pub const DEFAULT_MAX_SCALE: u32 = 8;

/// A strictly positive amount of money moved by a ledger operation.
///
/// Balances may legitimately be zero (or negative when overdraft is
/// enabled), so they stay plain [`Decimal`]s; only the *movement* is
/// constrained here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Create an amount, rejecting zero, negative and over-precise values.
    pub fn new(value: Decimal) -> Result<Self> {
        Self::with_max_scale(value, DEFAULT_MAX_SCALE)
    }

    /// Create an amount with an explicit fractional-digit limit.
    pub fn with_max_scale(value: Decimal, max_scale: u32) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount {
                amount: value.to_string(),
                reason: "amount must be positive".to_string(),
            });
        }

        let normalized = value.normalize();
        if normalized.scale() > max_scale {
            return Err(LedgerError::InvalidAmount {
                amount: value.to_string(),
                reason: format!("at most {} decimal places allowed", max_scale),
            });
        }

        Ok(Self(value))
    }

    /// Get the decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Balance after crediting this amount; `InvalidAmount` if it overflows.
    pub fn credit(&self, balance: Decimal) -> Result<Decimal> {
        balance
            .checked_add(self.0)
            .ok_or_else(|| self.overflow(balance))
    }

    /// Balance after debiting this amount; `InvalidAmount` if it overflows.
    pub fn debit(&self, balance: Decimal) -> Result<Decimal> {
        balance
            .checked_sub(self.0)
            .ok_or_else(|| self.overflow(balance))
    }

    fn overflow(&self, balance: Decimal) -> LedgerError {
        LedgerError::InvalidAmount {
            amount: self.0.to_string(),
            reason: format!("balance {} would overflow", balance),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim()).map_err(|e| LedgerError::InvalidAmount {
            amount: s.to_string(),
            reason: e.to_string(),
        })?;
        Self::new(value)
    }
}

/// Sum decimals without panicking; `None` on overflow.
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| acc.checked_add(value))
}

/// Parse a balance persisted as decimal text.
pub fn parse_balance(raw: &str) -> std::result::Result<Decimal, rust_decimal::Error> {
    Decimal::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_positive_amount() {
        let amount = Amount::new(dec!(20.50)).unwrap();
        assert_eq!(amount.value(), dec!(20.50));
        assert_eq!(amount.to_string(), "20.50");
    }

    #[test]
    fn test_rejects_zero_and_negative() {
        assert!(matches!(
            Amount::new(Decimal::ZERO),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            Amount::new(dec!(-1)),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_scale_limit_ignores_trailing_zeros() {
        assert!(Amount::with_max_scale(dec!(1.10000), 2).is_ok());
        assert!(Amount::with_max_scale(dec!(1.001), 2).is_err());
    }

    #[test]
    fn test_credit_and_debit_overflow() {
        let one = Amount::new(dec!(1)).unwrap();
        assert_eq!(one.credit(dec!(99)).unwrap(), dec!(100));
        assert_eq!(one.debit(dec!(0)).unwrap(), dec!(-1));
        assert!(matches!(
            one.credit(Decimal::MAX),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            one.debit(Decimal::MIN),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_checked_sum() {
        assert_eq!(checked_sum([dec!(1.5), dec!(2.5)]), Some(dec!(4)));
        assert_eq!(checked_sum(Vec::new()), Some(Decimal::ZERO));
        assert_eq!(checked_sum([Decimal::MAX, dec!(1)]), None);
    }

    #[test]
    fn test_parse_from_str() {
        let amount: Amount = " 42.5 ".parse().unwrap();
        assert_eq!(amount.value(), dec!(42.5));
        assert!("abc".parse::<Amount>().is_err());
        assert!("0".parse::<Amount>().is_err());
    }

    #[test]
    fn test_deserialize_rejects_non_positive() {
        let ok: Amount = serde_json::from_str("\"12.25\"").unwrap();
        assert_eq!(ok.value(), dec!(12.25));
        assert!(serde_json::from_str::<Amount>("\"-3\"").is_err());
    }
}
