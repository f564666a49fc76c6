//! `note` and `document` share one rule: the referenced account must be
//! open on the directive date. Neither mutates any state.

use beanledger_core::{Document, Note};

use crate::error::LedgerError;
use crate::handlers::DirectiveProcess;
use crate::ledger::Ledger;

impl<'a> DirectiveProcess<'a> for Note<'a> {
    type Delta = ();

    fn validate(&self, ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<()>) {
        match super::account_open_error(ledger, &self.account.name(), self.date) {
            Some(kind) => (super::locate(vec![kind], &self.pos, Some(self.date)), None),
            None => (Vec::new(), Some(())),
        }
    }

    fn apply(&mut self, _ledger: &mut Ledger<'a>, _delta: (), _index: usize) {}
}

impl<'a> DirectiveProcess<'a> for Document<'a> {
    type Delta = ();

    fn validate(&self, ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<()>) {
        match super::account_open_error(ledger, &self.account.name(), self.date) {
            Some(kind) => (super::locate(vec![kind], &self.pos, Some(self.date)), None),
            None => (Vec::new(), Some(())),
        }
    }

    fn apply(&mut self, _ledger: &mut Ledger<'a>, _delta: (), _index: usize) {}
}
