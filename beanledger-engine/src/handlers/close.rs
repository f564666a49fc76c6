use beanledger_core::Close;

use crate::error::{ErrorKind, LedgerError};
use crate::graph::{Edge, EdgeKind};
use crate::handlers::DirectiveProcess;
use crate::ledger::Ledger;

impl<'a> DirectiveProcess<'a> for Close<'a> {
    type Delta = ();

    fn validate(&self, ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<()>) {
        let name = self.account.name();
        let kind = match ledger.accounts.get(&name) {
            None => Some(ErrorKind::AccountNotClosed { account: name }),
            Some(account) if account.is_closed() => {
                Some(ErrorKind::AccountAlreadyClosed { account: name })
            }
            // Closing with a nonzero inventory is allowed; the account just
            // becomes unusable from here on.
            Some(_) => None,
        };
        match kind {
            Some(kind) => (super::locate(vec![kind], &self.pos, Some(self.date)), None),
            None => (Vec::new(), Some(())),
        }
    }

    fn apply(&mut self, ledger: &mut Ledger<'a>, _delta: (), _index: usize) {
        let name = self.account.name();
        let account = ledger
            .accounts
            .get_mut(&name)
            .expect("validated account exists");
        account.close_date = Some(self.date);
        if let Some(parent) = self.account.parent_name() {
            ledger.graph.add_edge(Edge {
                from: name,
                to: parent,
                kind: EdgeKind::Closing,
                date: Some(self.date),
                rate: None,
                inferred: false,
                valid_until: None,
            });
        }
    }
}
