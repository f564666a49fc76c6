use beanledger_core::BcOption;

use crate::error::LedgerError;
use crate::handlers::DirectiveProcess;
use crate::ledger::Ledger;

impl<'a> DirectiveProcess<'a> for BcOption<'a> {
    type Delta = ();

    fn validate(&self, _ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<()>) {
        (Vec::new(), Some(()))
    }

    /// Recognized keys reconfigure the engine; every key, known or not, is
    /// preserved verbatim in the options bag.
    fn apply(&mut self, ledger: &mut Ledger<'a>, _delta: (), _index: usize) {
        ledger.config.apply_option(&self.name, &self.val);
        ledger
            .options
            .entry(self.name.to_string())
            .or_default()
            .push(self.val.to_string());
    }
}
