use beanledger_core::{metadata, Commodity, OwnedMeta};

use crate::error::LedgerError;
use crate::graph::NodeKind;
use crate::handlers::DirectiveProcess;
use crate::ledger::Ledger;

impl<'a> DirectiveProcess<'a> for Commodity<'a> {
    type Delta = OwnedMeta;

    fn validate(&self, _ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<OwnedMeta>) {
        (Vec::new(), Some(metadata::meta_to_owned(&self.meta)))
    }

    /// An explicit declaration upgrades any implicitly created currency
    /// node to a commodity node carrying the declared metadata.
    fn apply(&mut self, ledger: &mut Ledger<'a>, meta: OwnedMeta, _index: usize) {
        ledger.graph.add_node(&self.name, NodeKind::Commodity, Some(meta));
    }
}
