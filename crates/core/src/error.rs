//! Ledger error model.

use thiserror::Error;

use crate::date::Date;

/// Result type used across the ledger engine.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// `Unbalanced` and `PrecisionOverflow` mean the producer feeding the builder
/// (parser or script) is broken; construction stops and no book is returned.
/// The remaining variants reject malformed arguments or enforce an opt-in
/// policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A transaction did not sum to zero in one of its currencies.
    #[error("in transaction ({date} {payee}) ccy {currency} has balance of {residual}")]
    Unbalanced {
        date: Date,
        payee: String,
        currency: String,
        residual: String,
    },

    /// The display precision of a currency could not be represented.
    #[error("decimal precision overflow for currency {0}")]
    PrecisionOverflow(String),

    /// No conversion rate was found and the price book rejects parity.
    #[error("no price to convert {unit} into {currency} on {date}")]
    MissingPrice {
        date: Date,
        unit: String,
        currency: String,
    },

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// A regular expression failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// An operation needed a book spanning at least one day.
    #[error("empty date range: {0}")]
    EmptyDateRange(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn unbalanced(
        date: Date,
        payee: impl Into<String>,
        currency: impl Into<String>,
        residual: impl ToString,
    ) -> Self {
        Self::Unbalanced {
            date,
            payee: payee.into(),
            currency: currency.into(),
            residual: residual.to_string(),
        }
    }

    pub fn missing_price(date: Date, unit: impl Into<String>, currency: impl Into<String>) -> Self {
        Self::MissingPrice {
            date,
            unit: unit.into(),
            currency: currency.into(),
        }
    }

    pub fn invalid_date(msg: impl Into<String>) -> Self {
        Self::InvalidDate(msg.into())
    }

    pub fn invalid_period(msg: impl Into<String>) -> Self {
        Self::InvalidPeriod(msg.into())
    }

    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors that indicate a broken producer rather than bad arguments.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Unbalanced { .. } | Self::PrecisionOverflow(_))
    }
}
