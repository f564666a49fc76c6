//! One handler per directive kind, all behind the same two-step contract:
//! `validate` reads a snapshot of the ledger and produces errors plus a
//! delta; `apply` mutates the ledger from that delta. `apply` only ever runs
//! when validation produced no errors, so a directive either lands whole or
//! not at all.

use beanledger_core::{Date, Meta, MetaValue, SourcePosition};

use crate::error::{ErrorKind, LedgerError};
use crate::ledger::Ledger;

pub(crate) mod balance;
pub(crate) mod close;
pub(crate) mod commodity;
pub(crate) mod document;
pub(crate) mod open;
pub(crate) mod options;
pub(crate) mod pad;
pub(crate) mod price;
pub(crate) mod transaction;

pub(crate) trait DirectiveProcess<'a> {
    type Delta;

    /// Pure check against the current ledger state. Returns every error the
    /// directive triggers; the delta is only meaningful when the error list
    /// is empty.
    fn validate(&self, ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<Self::Delta>);

    /// Mutates the ledger from a delta produced by a clean validation.
    /// `index` is the directive's position in the input stream.
    fn apply(&mut self, ledger: &mut Ledger<'a>, delta: Self::Delta, index: usize);

    fn handle(&mut self, ledger: &mut Ledger<'a>, index: usize) {
        let (errors, delta) = self.validate(ledger);
        if !errors.is_empty() {
            ledger.errors.extend(errors);
            return;
        }
        if let Some(delta) = delta {
            self.apply(ledger, delta, index);
        }
    }
}

/// Attaches a directive's position and date to a batch of error kinds.
pub(crate) fn locate(
    kinds: Vec<ErrorKind>,
    pos: &SourcePosition,
    date: Option<Date>,
) -> Vec<LedgerError> {
    kinds
        .into_iter()
        .map(|kind| LedgerError::new(kind, pos.clone(), date))
        .collect()
}

/// `AccountNotOpen` unless the account exists and admits the date.
pub(crate) fn account_open_error(ledger: &Ledger<'_>, name: &str, date: Date) -> Option<ErrorKind> {
    match ledger.accounts.get(name) {
        Some(account) if account.is_open_on(date) => None,
        _ => Some(ErrorKind::AccountNotOpen {
            account: name.to_string(),
        }),
    }
}

/// Duplicate keys and empty text values are the two metadata defects the
/// engine reports.
pub(crate) fn metadata_errors(meta: &Meta<'_>) -> Vec<ErrorKind> {
    let mut errors = Vec::new();
    for (index, (key, value)) in meta.iter().enumerate() {
        if meta.iter().take(index).any(|(prior, _)| prior == key) {
            errors.push(ErrorKind::InvalidMetadata {
                key: key.to_string(),
                reason: "duplicate key".to_string(),
            });
        }
        if let MetaValue::Text(text) = value {
            if text.is_empty() {
                errors.push(ErrorKind::InvalidMetadata {
                    key: key.to_string(),
                    reason: "empty value".to_string(),
                });
            }
        }
    }
    errors
}
