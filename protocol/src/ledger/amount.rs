//! Currency amounts.
//!
//! An [`Amount`] is a non-negative integer quantity in the smallest unit of a
//! [`Currency`]. Negative amounts are unrepresentable: subtraction that would
//! go below zero fails with [`AmountError::NegativeAmount`] instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from amount arithmetic and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Two amounts with different currency units were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    /// The result of a subtraction would be negative.
    #[error("amount would be negative: {minuend} - {subtrahend}")]
    NegativeAmount { minuend: u64, subtrahend: u64 },

    /// The result of an addition does not fit in a `u64`.
    #[error("amount overflow")]
    Overflow,

    /// A currency code that is empty or not alphanumeric.
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Currency denominations.
///
/// The common ISO codes get their own variant; anything else is carried as
/// [`Currency::Custom`] with its (upper-cased) code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    USD,
    EUR,
    GBP,
    CHF,
    JPY,
    BRL,
    Custom(String),
}

impl Currency {
    /// The currency code, e.g. `"USD"`.
    pub fn code(&self) -> &str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CHF => "CHF",
            Self::JPY => "JPY",
            Self::BRL => "BRL",
            Self::Custom(code) => code,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AmountError::InvalidCurrency(s.to_string()));
        }
        Ok(match code.as_str() {
            "USD" => Self::USD,
            "EUR" => Self::EUR,
            "GBP" => Self::GBP,
            "CHF" => Self::CHF,
            "JPY" => Self::JPY,
            "BRL" => Self::BRL,
            _ => Self::Custom(code),
        })
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A monetary amount in the smallest indivisible unit of a currency.
///
/// # Examples
///
/// ```
/// use obligation_protocol::ledger::{Amount, Currency};
///
/// let owed = Amount::new(100, Currency::USD);
/// let paid = Amount::new(40, Currency::USD);
/// assert_eq!(owed.checked_sub(&paid).unwrap(), Amount::new(60, Currency::USD));
/// assert!(paid.checked_sub(&owed).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// Quantity in the smallest unit of the currency.
    pub quantity: u64,
    pub currency: Currency,
}

impl Amount {
    pub fn new(quantity: u64, currency: Currency) -> Self {
        Self { quantity, currency }
    }

    /// A zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.quantity == 0
    }

    fn same_currency(&self, other: &Amount) -> Result<(), AmountError> {
        if self.currency != other.currency {
            return Err(AmountError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        self.same_currency(other)?;
        let quantity = self
            .quantity
            .checked_add(other.quantity)
            .ok_or(AmountError::Overflow)?;
        Ok(Amount::new(quantity, self.currency.clone()))
    }

    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        self.same_currency(other)?;
        let quantity =
            self.quantity
                .checked_sub(other.quantity)
                .ok_or(AmountError::NegativeAmount {
                    minuend: self.quantity,
                    subtrahend: other.quantity,
                })?;
        Ok(Amount::new(quantity, self.currency.clone()))
    }

    /// Sums amounts that must all be in `currency`. An empty iterator sums to zero.
    pub fn sum<'a, I>(amounts: I, currency: &Currency) -> Result<Amount, AmountError>
    where
        I: IntoIterator<Item = &'a Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::zero(currency.clone()), |acc, a| acc.checked_add(a))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.currency)
    }
}
