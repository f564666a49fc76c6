use beanledger_core::Pad;

use crate::error::LedgerError;
use crate::handlers::DirectiveProcess;
use crate::ledger::Ledger;

impl<'a> DirectiveProcess<'a> for Pad<'a> {
    type Delta = ();

    fn validate(&self, ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<()>) {
        let mut kinds = Vec::new();
        for account in &[&self.account, &self.source_account] {
            if let Some(kind) = super::account_open_error(ledger, &account.name(), self.date) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            (Vec::new(), Some(()))
        } else {
            (super::locate(kinds, &self.pos, Some(self.date)), None)
        }
    }

    fn apply(&mut self, ledger: &mut Ledger<'a>, _delta: (), _index: usize) {
        ledger.push_pad(
            self.date,
            self.account.name(),
            self.source_account.name(),
            self.pos.clone(),
        );
    }
}
