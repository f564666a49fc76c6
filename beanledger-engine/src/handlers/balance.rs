use std::borrow::Cow;
use std::collections::HashSet;

use beanledger_core::{
    Account as AstAccount, Balance, Flag, IncompleteAmount, Posting, Transaction,
};

use crate::error::{ErrorKind, LedgerError};
use crate::expr;
use crate::handlers::DirectiveProcess;
use crate::ledger::{Ledger, PadState};

pub(crate) enum BalanceDelta {
    /// A pending pad covers this assertion; consume it and, if the gap
    /// exceeds tolerance, schedule the given synthetic transaction.
    ConsumePad {
        pad_index: usize,
        synthetic: Option<Transaction<'static>>,
    },
    /// The assertion held on its own.
    Checked,
}

impl<'a> DirectiveProcess<'a> for Balance<'a> {
    type Delta = BalanceDelta;

    fn validate(&self, ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<BalanceDelta>) {
        let name = self.account.name();
        if let Some(kind) = super::account_open_error(ledger, &name, self.date) {
            return (super::locate(vec![kind], &self.pos, Some(self.date)), None);
        }

        let expected = match expr::eval_amount(&self.amount.expr) {
            Ok(expected) => expected,
            Err(err) => {
                let kind = ErrorKind::InvalidAmount {
                    value: self.amount.expr.to_string(),
                    reason: err.to_string(),
                };
                return (super::locate(vec![kind], &self.pos, Some(self.date)), None);
            }
        };

        let currency = self.amount.currency.to_string();
        let account = ledger.accounts.get(&name).expect("account checked above");
        let actual = account.inventory.get(&currency);

        let tolerance = self.tolerance.unwrap_or_else(|| {
            ledger
                .config
                .tolerance
                .effective(&currency, Some(ledger.config.tolerance.inferred_from(&expected)))
        });

        // The most recent pending pad strictly before the assertion date
        // stands; older or later pads do not.
        let pad_index = ledger
            .pads
            .iter()
            .rposition(|pad| pad.state == PadState::Pending && pad.account == name && pad.date < self.date);

        if let Some(pad_index) = pad_index {
            let difference = expected - actual;
            let synthetic = if difference.abs() > tolerance {
                let pad = &ledger.pads[pad_index];
                Some(padding_transaction(
                    pad.date,
                    &pad.account,
                    &pad.source_account,
                    difference,
                    &currency,
                    &name,
                    expected,
                ))
            } else {
                None
            };
            return (Vec::new(), Some(BalanceDelta::ConsumePad { pad_index, synthetic }));
        }

        if (actual - expected).abs() > tolerance {
            let kind = ErrorKind::BalanceMismatch {
                account: name,
                expected,
                actual,
                currency,
            };
            return (super::locate(vec![kind], &self.pos, Some(self.date)), None);
        }
        (Vec::new(), Some(BalanceDelta::Checked))
    }

    fn apply(&mut self, ledger: &mut Ledger<'a>, delta: BalanceDelta, _index: usize) {
        match delta {
            BalanceDelta::ConsumePad { pad_index, synthetic } => {
                ledger.pads[pad_index].state = PadState::Used;
                if let Some(txn) = synthetic {
                    // Inventory is not touched here; the
                    // post-pass replays synthetic transactions so the
                    // directive stream stays the single source of truth.
                    ledger.synthetic.push(txn);
                }
            }
            BalanceDelta::Checked => {}
        }
    }
}

fn padding_transaction(
    date: beanledger_core::Date,
    account: &str,
    source_account: &str,
    difference: rust_decimal::Decimal,
    currency: &str,
    asserted_account: &str,
    expected: rust_decimal::Decimal,
) -> Transaction<'static> {
    let owned_account = AstAccount::new(account.split(':').map(|s| s.to_string()).collect::<Vec<_>>());
    let owned_source = AstAccount::new(
        source_account
            .split(':')
            .map(|s| s.to_string())
            .collect::<Vec<_>>(),
    );
    Transaction {
        date,
        flag: Flag::Padding,
        payee: None,
        narration: Cow::Owned(format!(
            "(Padding inserted for balance of {} {} for {})",
            expected, currency, asserted_account
        )),
        tags: HashSet::new(),
        links: HashSet::new(),
        postings: vec![
            Posting {
                account: owned_account,
                units: IncompleteAmount {
                    expr: None,
                    num: Some(difference),
                    currency: Some(Cow::Owned(currency.to_string())),
                },
                cost: None,
                price: None,
                flag: None,
                meta: Vec::new(),
                inferred: false,
            },
            Posting {
                account: owned_source,
                units: IncompleteAmount {
                    expr: None,
                    num: Some(-difference),
                    currency: Some(Cow::Owned(currency.to_string())),
                },
                cost: None,
                price: None,
                flag: None,
                meta: Vec::new(),
                inferred: false,
            },
        ],
        meta: Vec::new(),
        pos: Default::default(),
    }
}
