//! The ledger: owned world state plus the processing loop that drives every
//! directive through its handler, synthesizes padding transactions, and
//! finishes with a stable re-sort of the directive stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info};
use rust_decimal::Decimal;

use beanledger_core::{Date, Directive, OwnedMeta, SourcePosition, Transaction};

use crate::account::{Account, AppliedPosting};
use crate::config::Config;
use crate::error::{ErrorKind, LedgerError, ProcessError};
use crate::graph::{Edge, EdgeKind, Graph, NodeKind};
use crate::handlers::DirectiveProcess;
use crate::prices::PriceGraph;

/// Cooperative cancellation: the processing loop checks it between
/// directives and nowhere else.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        CancelSignal::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PadState {
    /// Waiting for a balance assertion on the padded account.
    Pending,
    /// Superseded by a later pad for the same account before being used.
    Displaced,
    /// Consumed by a balance assertion.
    Used,
}

/// A `pad` directive the ledger is holding on to.
#[derive(Clone, Debug)]
pub struct PadEntry {
    pub date: Date,
    pub account: String,
    pub source_account: String,
    pub pos: SourcePosition,
    pub state: PadState,
}

/// World state built by processing a directive stream. Owns the accounts,
/// both graphs, the options bag and every error encountered; the directive
/// stream itself (including synthesized transactions) is kept as the single
/// source of truth for replays and reports.
pub struct Ledger<'a> {
    pub config: Config,
    pub accounts: HashMap<String, Account>,
    pub graph: Graph,
    pub prices: PriceGraph,
    /// Every `option` seen, known or unknown, in encounter order per key.
    pub options: HashMap<String, Vec<String>>,
    pub directives: Vec<Directive<'a>>,
    pub errors: Vec<LedgerError>,
    /// Padding transactions synthesized while processing, also merged into
    /// `directives` by the post-pass.
    pub synthetic: Vec<Transaction<'a>>,
    pub(crate) pads: Vec<PadEntry>,
}

impl<'a> Ledger<'a> {
    fn empty(config: Config) -> Self {
        Ledger {
            config,
            accounts: HashMap::new(),
            graph: Graph::new(),
            prices: PriceGraph::new(),
            options: HashMap::new(),
            directives: Vec::new(),
            errors: Vec::new(),
            synthetic: Vec::new(),
            pads: Vec::new(),
        }
    }

    /// Processes a directive stream into a ledger. Collected errors do not
    /// stop processing; inspect them on the returned ledger or through
    /// [`Ledger::check`].
    pub fn process(directives: Vec<Directive<'a>>, config: Config) -> Ledger<'a> {
        match Self::run(directives, config, None) {
            Ok(ledger) => ledger,
            // Without a signal there is nothing that can cancel the run.
            Err(_) => unreachable!("uncancellable run was cancelled"),
        }
    }

    /// Like [`Ledger::process`], stopping between directives once `signal`
    /// fires.
    pub fn process_cancellable(
        directives: Vec<Directive<'a>>,
        config: Config,
        signal: &CancelSignal,
    ) -> Result<Ledger<'a>, ProcessError> {
        Self::run(directives, config, Some(signal))
    }

    fn run(
        mut directives: Vec<Directive<'a>>,
        config: Config,
        signal: Option<&CancelSignal>,
    ) -> Result<Ledger<'a>, ProcessError> {
        let mut ledger = Ledger::empty(config);
        info!("processing {} directives", directives.len());

        for index in 0..directives.len() {
            if signal.map_or(false, CancelSignal::is_cancelled) {
                return Err(ProcessError::Cancelled);
            }
            dispatch(&mut ledger, &mut directives[index], index);
        }

        ledger.finalize(&mut directives);
        ledger.directives = directives;

        let error_count = ledger.errors.iter().filter(|e| !e.is_warning()).count();
        if error_count > 0 {
            error!("ledger loaded with {} error(s)", error_count);
        } else {
            info!("ledger loaded");
        }
        Ok(ledger)
    }

    /// The wrapping result demanded by callers: `Err` when any non-warning
    /// error was collected, with the full ordered list attached.
    pub fn check(&self) -> Result<(), ProcessError> {
        if self.errors.iter().any(|e| !e.is_warning()) {
            Err(ProcessError::Invalid {
                errors: self.errors.clone(),
            })
        } else {
            Ok(())
        }
    }

    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.get(name)
    }

    /// First value recorded for an option key.
    pub fn get_option(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// All values recorded for an option key, in encounter order.
    pub fn get_options(&self, key: &str) -> &[String] {
        self.options.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The padding transactions synthesized during processing.
    pub fn synthetic_transactions(&self) -> &[Transaction<'a>] {
        &self.synthetic
    }

    /// Registers the account and any missing ancestors in the graph. The
    /// opened account carries its metadata (making it explicit); ancestors
    /// created on the way are implicit. Constraint currencies become
    /// currency nodes joined by opening edges.
    pub(crate) fn register_account_nodes(
        &mut self,
        name: &str,
        date: Date,
        meta: OwnedMeta,
        currencies: &[String],
    ) {
        let parts: Vec<&str> = name.split(':').collect();
        let mut prefix = String::new();
        let mut parent: Option<String> = None;
        for (depth, part) in parts.iter().enumerate() {
            if depth > 0 {
                prefix.push(':');
            }
            prefix.push_str(part);
            let is_leaf = depth == parts.len() - 1;
            let newly_created = !self.graph.has_node(&prefix);
            if is_leaf {
                self.graph.add_node(&prefix, NodeKind::Account, Some(meta.clone()));
            } else {
                self.graph.add_node(&prefix, NodeKind::Account, None);
            }
            if newly_created {
                if let Some(parent) = &parent {
                    self.graph.add_edge(Edge {
                        from: parent.clone(),
                        to: prefix.clone(),
                        kind: EdgeKind::Opening,
                        date: Some(date),
                        rate: None,
                        inferred: false,
                        valid_until: None,
                    });
                }
            }
            parent = Some(prefix.clone());
        }
        for currency in currencies {
            self.graph.add_node(currency, NodeKind::Currency, None);
        }
    }

    /// Stores a pad, displacing any still-pending pad for the same account;
    /// the displaced one is reported unused at end-of-processing.
    pub(crate) fn push_pad(
        &mut self,
        date: Date,
        account: String,
        source_account: String,
        pos: SourcePosition,
    ) {
        for pad in self.pads.iter_mut() {
            if pad.state == PadState::Pending && pad.account == account {
                pad.state = PadState::Displaced;
            }
        }
        self.pads.push(PadEntry {
            date,
            account,
            source_account,
            pos,
            state: PadState::Pending,
        });
    }

    /// Feeds a rate into both the temporal price table and the graph's
    /// bidirectional price edges.
    pub(crate) fn record_price(
        &mut self,
        date: Date,
        base: &str,
        quote: &str,
        rate: Decimal,
        inferred: bool,
    ) {
        if self.prices.add_price(date, base, quote, rate).is_err() {
            return;
        }
        self.graph
            .add_price_edge(base, quote, date, rate, inferred)
            .expect("rate was accepted by the price table");
    }

    /// Post-pass: merge synthesized transactions into the stream, replay
    /// them against the inventories, stable-sort everything by date, and
    /// report pads nothing consumed.
    fn finalize(&mut self, directives: &mut Vec<Directive<'a>>) {
        self.synthetic.sort_by_key(|t| t.date);
        let synthetic = self.synthetic.clone();
        for txn in &synthetic {
            let index = directives.len();
            directives.push(Directive::Transaction(txn.clone()));
            self.apply_synthetic(txn, index);
        }

        // Stable sort by date, options (dateless) first; account posting
        // back-references are remapped through the permutation.
        let mut order: Vec<usize> = (0..directives.len()).collect();
        order.sort_by_key(|&i| directives[i].date());
        let mut new_index = vec![0usize; order.len()];
        for (new_pos, &old_pos) in order.iter().enumerate() {
            new_index[old_pos] = new_pos;
        }
        let mut slots: Vec<Option<Directive<'a>>> =
            std::mem::take(directives).into_iter().map(Some).collect();
        *directives = order
            .iter()
            .map(|&i| slots[i].take().expect("each directive moves exactly once"))
            .collect();
        for account in self.accounts.values_mut() {
            for posting in &mut account.postings {
                posting.txn_index = new_index[posting.txn_index];
            }
        }

        let mut warnings = Vec::new();
        for pad in &self.pads {
            if pad.state != PadState::Used {
                warnings.push(LedgerError::new(
                    ErrorKind::UnusedPad {
                        account: pad.account.clone(),
                        source_account: pad.source_account.clone(),
                    },
                    pad.pos.clone(),
                    Some(pad.date),
                ));
            }
        }
        self.errors.extend(warnings);
    }

    /// Replays one pre-validated synthetic transaction against account
    /// inventories and posting lists. Padding postings are plain currency
    /// amounts, so additions and unconstrained reductions cover them.
    fn apply_synthetic(&mut self, txn: &Transaction<'a>, index: usize) {
        for (posting_index, posting) in txn.postings.iter().enumerate() {
            let units = posting
                .units
                .num
                .expect("synthetic postings carry resolved amounts");
            let currency = posting
                .units
                .currency
                .as_ref()
                .expect("synthetic postings carry currencies")
                .to_string();
            let name = posting.account.name();
            let account = self
                .accounts
                .get_mut(&name)
                .expect("synthetic transactions reference validated accounts");
            if units > Decimal::ZERO {
                account.inventory.add(&currency, units, None);
            } else if units < Decimal::ZERO {
                account
                    .inventory
                    .reduce_lot(&currency, units, None, account.booking)
                    .expect("unconstrained reductions cannot fail");
            }
            account.postings.push(AppliedPosting {
                date: txn.date,
                units,
                currency,
                txn_index: index,
                posting_index,
            });
        }
    }
}

/// Routes a directive to its handler. The `validate`/`apply` split lives on
/// each handler; this match is the registry.
fn dispatch<'a>(ledger: &mut Ledger<'a>, directive: &mut Directive<'a>, index: usize) {
    match directive {
        Directive::Open(d) => d.handle(ledger, index),
        Directive::Close(d) => d.handle(ledger, index),
        Directive::Transaction(d) => d.handle(ledger, index),
        Directive::Balance(d) => d.handle(ledger, index),
        Directive::Pad(d) => d.handle(ledger, index),
        Directive::Price(d) => d.handle(ledger, index),
        Directive::Commodity(d) => d.handle(ledger, index),
        Directive::Note(d) => d.handle(ledger, index),
        Directive::Document(d) => d.handle(ledger, index),
        // Reserved hooks: nothing to validate, nothing to apply.
        Directive::Event(_) | Directive::Custom(_) => {}
        Directive::Option(d) => d.handle(ledger, index),
    }
}
