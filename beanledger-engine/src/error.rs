//! Structured errors and warnings accumulated while processing directives.
//!
//! Every error pairs a kind (with its kind-specific fields) with the source
//! position and date of the directive that produced it. Formatting follows
//! the `"{filename}:{line}: {message}"` convention, falling back to
//! `"{date}: {message}"` when no filename is known.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use beanledger_core::{Date, SourcePosition};

/// Renders residuals as `"(5 USD, 3 EUR)"`, currencies sorted
/// lexicographically.
pub(crate) fn format_residuals(residuals: &[(String, Decimal)]) -> String {
    let mut sorted: Vec<&(String, Decimal)> = residuals.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let parts: Vec<String> = sorted
        .iter()
        .map(|(currency, amount)| format!("{} {}", amount, currency))
        .collect();
    format!("({})", parts.join(", "))
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ErrorKind {
    #[error("account {account} is not open")]
    AccountNotOpen { account: String },

    #[error("account {account} is already open")]
    AccountAlreadyOpen { account: String },

    #[error("account {account} is already closed")]
    AccountAlreadyClosed { account: String },

    #[error("account {account} was never opened")]
    AccountNotClosed { account: String },

    #[error("invalid account name {account}: unknown account type {root}")]
    InvalidAccountName { account: String, root: String },

    #[error("invalid booking method \"{value}\" for account {account}")]
    InvalidBooking { account: String, value: String },

    #[error("transaction does not balance: {}", format_residuals(.residuals))]
    TransactionNotBalanced {
        residuals: Vec<(String, Decimal)>,
        payee: Option<String>,
    },

    #[error("invalid amount \"{value}\": {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("posting {posting_index}: invalid cost {cost_spec}: {reason}")]
    InvalidCost {
        posting_index: usize,
        cost_spec: String,
        reason: String,
    },

    #[error("posting {posting_index}: total cost {cost_spec} requires a nonzero quantity")]
    TotalCost {
        posting_index: usize,
        cost_spec: String,
    },

    #[error("posting {posting_index}: invalid price {price_spec}: {reason}")]
    InvalidPrice {
        posting_index: usize,
        price_spec: String,
        reason: String,
    },

    #[error("invalid price for {currency}: {reason}")]
    InvalidDirectivePrice { currency: String, reason: String },

    #[error("posting {posting_index}: insufficient inventory in {account}: {reason}")]
    InsufficientInventory {
        posting_index: usize,
        account: String,
        reason: String,
    },

    #[error("posting {posting_index}: currency {currency} not allowed for {account} (allowed: {})", .allowed_currencies.join(", "))]
    CurrencyConstraint {
        posting_index: usize,
        account: String,
        currency: String,
        allowed_currencies: Vec<String>,
    },

    #[error("balance mismatch for {account}:\nExpected: {expected} {currency}\nActual: {actual} {currency}")]
    BalanceMismatch {
        account: String,
        expected: Decimal,
        actual: Decimal,
        currency: String,
    },

    #[error("invalid metadata key \"{key}\": {reason}")]
    InvalidMetadata { key: String, reason: String },

    #[error("pad for {account} from {source_account} was never used by a balance assertion")]
    UnusedPad {
        account: String,
        source_account: String,
    },
}

/// One fully-located error or warning.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerError {
    pub kind: ErrorKind,
    pub position: SourcePosition,
    pub date: Option<Date>,
}

impl LedgerError {
    pub fn new(kind: ErrorKind, position: SourcePosition, date: Option<Date>) -> Self {
        LedgerError {
            kind,
            position,
            date,
        }
    }

    /// Warnings are reported alongside errors but never fail processing.
    pub fn is_warning(&self) -> bool {
        matches!(self.kind, ErrorKind::UnusedPad { .. })
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.position.filename.is_empty() {
            write!(f, "{}:{}: {}", self.position.filename, self.position.line, self.kind)
        } else if let Some(date) = self.date {
            write!(f, "{}: {}", date.format("%Y-%m-%d"), self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl std::error::Error for LedgerError {}

/// The result of a whole processing run, for callers that want a single
/// `Result`: any non-warning error collapses into `Invalid`.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ProcessError {
    #[error("ledger contains {} error(s)", .errors.iter().filter(|e| !e.is_warning()).count())]
    Invalid { errors: Vec<LedgerError> },

    #[error("processing was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pos(file: &str) -> SourcePosition {
        SourcePosition::new(file, 12, 3)
    }

    #[test]
    fn residuals_sort_lexicographically() {
        let residuals = vec![
            ("USD".to_string(), dec!(5)),
            ("EUR".to_string(), dec!(3)),
        ];
        assert_eq!(format_residuals(&residuals), "(3 EUR, 5 USD)");
    }

    #[test]
    fn message_prefers_filename_position() {
        let err = LedgerError::new(
            ErrorKind::AccountNotOpen {
                account: "Assets:Cash".to_string(),
            },
            pos("main.bean"),
            Date::from_ymd_opt(2024, 1, 5),
        );
        assert_eq!(err.to_string(), "main.bean:12: account Assets:Cash is not open");
    }

    #[test]
    fn message_falls_back_to_date() {
        let err = LedgerError::new(
            ErrorKind::AccountNotOpen {
                account: "Assets:Cash".to_string(),
            },
            SourcePosition::default(),
            Date::from_ymd_opt(2024, 1, 5),
        );
        assert_eq!(err.to_string(), "2024-01-05: account Assets:Cash is not open");
    }

    #[test]
    fn balance_mismatch_renders_two_lines() {
        let kind = ErrorKind::BalanceMismatch {
            account: "Assets:Cash".to_string(),
            expected: dec!(100.00),
            actual: dec!(90.00),
            currency: "USD".to_string(),
        };
        let rendered = kind.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "Expected: 100.00 USD");
        assert_eq!(lines[2], "Actual: 90.00 USD");
    }

    #[test]
    fn only_unused_pad_is_a_warning() {
        let warning = LedgerError::new(
            ErrorKind::UnusedPad {
                account: "Assets:Cash".to_string(),
                source_account: "Equity:Opening".to_string(),
            },
            SourcePosition::default(),
            None,
        );
        assert!(warning.is_warning());

        let error = LedgerError::new(
            ErrorKind::AccountNotOpen {
                account: "Assets:Cash".to_string(),
            },
            SourcePosition::default(),
            None,
        );
        assert!(!error.is_warning());
    }
}
