//! Transaction validation and application.
//!
//! Validation runs the full pipeline against a read-only ledger snapshot:
//! amount resolution, account and constraint checks, cost/price/metadata
//! checks, weight and residual computation with single-missing-amount and
//! empty/merge-cost inference, tolerance-bounded balancing, and a dry run
//! of every inventory mutation. Nothing is mutated unless every check
//! passes; apply then replays the precomputed actions and writes inferred
//! values back onto the posting AST nodes.

use std::borrow::Cow;
use std::collections::HashMap;

use rust_decimal::Decimal;

use beanledger_core::{Booking, CostSpec, Transaction};

use crate::account::AppliedPosting;
use crate::error::{ErrorKind, LedgerError};
use crate::expr;
use crate::graph::{Edge, EdgeKind, NodeKind};
use crate::handlers::DirectiveProcess;
use crate::inventory::LotSpec;
use crate::ledger::Ledger;
use crate::tolerance::ToleranceSet;
use crate::weight::{self, ResolvedPrice, Weight};

pub(crate) struct TransactionDelta {
    postings: Vec<ResolvedPosting>,
}

struct ResolvedPosting {
    index: usize,
    account: String,
    units: Decimal,
    currency: String,
    /// The amount was not written by the user.
    inferred_amount: bool,
    /// Per-unit cost and currency inferred for an empty or merge cost.
    inferred_cost: Option<(Decimal, String)>,
    action: Option<LotAction>,
    /// Per-unit rate from a price annotation, recorded as an inferred
    /// price edge on apply.
    price_edge: Option<(Decimal, String)>,
}

enum LotAction {
    Add { spec: Option<LotSpec> },
    Reduce { spec: Option<LotSpec>, method: Booking },
}

fn render_cost(cost: &CostSpec<'_>) -> String {
    if cost.merge {
        return "{*}".to_string();
    }
    let mut parts = Vec::new();
    if let Some(per) = &cost.number_per {
        match &cost.currency {
            Some(currency) => parts.push(format!("{} {}", per, currency)),
            None => parts.push(per.to_string()),
        }
    }
    if let Some(total) = &cost.number_total {
        match &cost.currency {
            Some(currency) => parts.push(format!("# {} {}", total, currency)),
            None => parts.push(format!("# {}", total)),
        }
    }
    if let Some(date) = &cost.date {
        parts.push(date.to_string());
    }
    if let Some(label) = &cost.label {
        parts.push(format!("\"{}\"", label));
    }
    format!("{{{}}}", parts.join(", "))
}

/// What each posting's units evaluated to before inference.
struct Units {
    num: Option<Decimal>,
    currency: Option<String>,
    /// False once the number came from inference rather than the input.
    from_input: bool,
}

impl<'a> DirectiveProcess<'a> for Transaction<'a> {
    type Delta = TransactionDelta;

    fn validate(&self, ledger: &Ledger<'a>) -> (Vec<LedgerError>, Option<TransactionDelta>) {
        let mut kinds: Vec<ErrorKind> = Vec::new();
        let locate = |kinds| super::locate(kinds, &self.pos, Some(self.date));
        let payee = self.payee.as_ref().map(|p| p.to_string());

        kinds.extend(super::metadata_errors(&self.meta));
        for posting in &self.postings {
            kinds.extend(super::metadata_errors(&posting.meta));
        }

        // Step 1: evaluate written amounts and prices.
        let mut units: Vec<Units> = Vec::with_capacity(self.postings.len());
        let mut prices: Vec<Option<ResolvedPrice>> = Vec::with_capacity(self.postings.len());
        for (index, posting) in self.postings.iter().enumerate() {
            let num = match (posting.units.num, &posting.units.expr) {
                (Some(num), _) => Some(num),
                (None, Some(expr_text)) => match expr::eval_amount(expr_text) {
                    Ok(num) => Some(num),
                    Err(err) => {
                        kinds.push(ErrorKind::InvalidAmount {
                            value: expr_text.to_string(),
                            reason: err.to_string(),
                        });
                        None
                    }
                },
                (None, None) => None,
            };
            let currency = posting.units.currency.as_ref().map(|c| c.to_string());
            if num.is_some() && currency.is_none() {
                kinds.push(ErrorKind::InvalidAmount {
                    value: num.map(|n| n.to_string()).unwrap_or_default(),
                    reason: "posting amount has no currency".to_string(),
                });
            }
            units.push(Units {
                num,
                currency,
                from_input: true,
            });
            prices.push(resolve_price(posting, index, &mut kinds));
        }

        // Step 2: accounts must be open and accept the posting currency.
        for (index, posting) in self.postings.iter().enumerate() {
            let name = posting.account.name();
            if let Some(kind) = super::account_open_error(ledger, &name, self.date) {
                kinds.push(kind);
                continue;
            }
            if let Some(currency) = &units[index].currency {
                let account = &ledger.accounts[&name];
                if !account.accepts_currency(currency) {
                    kinds.push(ErrorKind::CurrencyConstraint {
                        posting_index: index,
                        account: name,
                        currency: currency.clone(),
                        allowed_currencies: account.currencies.clone(),
                    });
                }
            }
        }

        // Step 3: cost specs.
        for (index, posting) in self.postings.iter().enumerate() {
            let cost = match &posting.cost {
                Some(cost) => cost,
                None => continue,
            };
            let rendered = render_cost(cost);
            let invalid = |reason: &str| ErrorKind::InvalidCost {
                posting_index: index,
                cost_spec: rendered.clone(),
                reason: reason.to_string(),
            };
            if cost.merge
                && (cost.number_per.is_some()
                    || cost.number_total.is_some()
                    || cost.date.is_some()
                    || cost.label.is_some())
            {
                kinds.push(invalid("merge cost takes no other components"));
            }
            if cost.number_per.is_some() && cost.number_total.is_some() {
                kinds.push(invalid("cost cannot be both per-unit and total"));
            }
            if cost.number_per.map_or(false, |n| n.is_sign_negative())
                || cost.number_total.map_or(false, |n| n.is_sign_negative())
            {
                kinds.push(invalid("cost must not be negative"));
            }
            if (cost.number_per.is_some() || cost.number_total.is_some()) && cost.currency.is_none() {
                kinds.push(invalid("cost has no currency"));
            }
            if units[index].num.is_none() {
                kinds.push(invalid("a posting with a cost needs an explicit amount"));
            }
            if cost.number_total.is_some() && units[index].num.map_or(false, |n| n.is_zero()) {
                kinds.push(ErrorKind::TotalCost {
                    posting_index: index,
                    cost_spec: rendered.clone(),
                });
            }
            if cost.is_empty() && units[index].num.map_or(false, |n| n.is_sign_negative()) {
                let name = posting.account.name();
                if let Some(account) = ledger.accounts.get(&name) {
                    if account.booking == Booking::Strict {
                        kinds.push(invalid("STRICT booking requires an explicit lot"));
                    }
                }
            }
        }

        if !kinds.is_empty() {
            return (locate(kinds), None);
        }

        // Step 4: weights, residuals, inference.
        let mut weights: Vec<Option<Weight>> = Vec::with_capacity(self.postings.len());
        let mut elided: Vec<usize> = Vec::new();
        let mut deferred: Vec<usize> = Vec::new();
        for (index, posting) in self.postings.iter().enumerate() {
            match (units[index].num, &units[index].currency) {
                (Some(num), Some(currency)) => {
                    let weight = weight::posting_weight(
                        num,
                        currency,
                        posting.cost.as_ref(),
                        prices[index].as_ref(),
                    );
                    if weight.is_none() {
                        deferred.push(index);
                    }
                    weights.push(weight);
                }
                _ => {
                    elided.push(index);
                    weights.push(None);
                }
            }
        }

        let ambiguous = elided.len() > 1
            || deferred.len() > 1
            || (!elided.is_empty() && !deferred.is_empty());
        if ambiguous {
            let kinds = vec![ErrorKind::TransactionNotBalanced {
                residuals: weight::residuals(weights.iter().flatten()),
                payee,
            }];
            return (locate(kinds), None);
        }

        let mut inferred_costs: HashMap<usize, (Decimal, String)> = HashMap::new();

        if let Some(&index) = elided.first() {
            let residual = weight::residuals(weights.iter().flatten());
            if residual.len() != 1 {
                let kinds = vec![ErrorKind::TransactionNotBalanced { residuals: residual, payee }];
                return (locate(kinds), None);
            }
            let (currency, amount) = residual.into_iter().next().expect("one residual");
            let inferred = -amount;
            // The inferred currency is still subject to the account's
            // constraint set.
            let name = self.postings[index].account.name();
            let account = &ledger.accounts[&name];
            if !account.accepts_currency(&currency) {
                let kinds = vec![ErrorKind::CurrencyConstraint {
                    posting_index: index,
                    account: name,
                    currency: currency.clone(),
                    allowed_currencies: account.currencies.clone(),
                }];
                return (locate(kinds), None);
            }
            weights[index] = Some(Weight {
                number: inferred,
                currency: currency.clone(),
            });
            units[index] = Units {
                num: Some(inferred),
                currency: Some(currency),
                from_input: false,
            };
        }

        if let Some(&index) = deferred.first() {
            let quantity = units[index].num.expect("deferred postings have amounts");
            let cost = self.postings[index].cost.as_ref().expect("deferred implies a cost");
            if quantity.is_zero() {
                let kinds = vec![ErrorKind::InvalidCost {
                    posting_index: index,
                    cost_spec: render_cost(cost),
                    reason: "cannot infer a cost for a zero quantity".to_string(),
                }];
                return (locate(kinds), None);
            }
            let residual = weight::residuals(weights.iter().flatten());
            let matching: Vec<&(String, Decimal)> = residual
                .iter()
                .filter(|(currency, _)| {
                    cost.currency.as_ref().map_or(true, |c| c.as_ref() == currency.as_str())
                })
                .collect();
            if matching.len() != 1 {
                let kinds = vec![ErrorKind::TransactionNotBalanced { residuals: residual.clone(), payee }];
                return (locate(kinds), None);
            }
            let (currency, amount) = (matching[0].0.clone(), matching[0].1);
            let per_unit = -(amount / quantity);
            inferred_costs.insert(index, (per_unit, currency.clone()));
            weights[index] = Some(Weight {
                number: quantity * per_unit,
                currency,
            });
        }

        // Step 5: residuals against per-currency tolerances.
        let mut tolerances = ToleranceSet::new();
        for (index, posting) in self.postings.iter().enumerate() {
            if !units[index].from_input {
                continue;
            }
            if let (Some(num), Some(currency)) = (units[index].num, &units[index].currency) {
                tolerances.observe(currency, ledger.config.tolerance.inferred_from(&num));
                if ledger.config.tolerance.infer_from_cost {
                    if let Some(cost) = &posting.cost {
                        if let (Some(per), Some(cost_currency)) =
                            (weight::per_unit_cost(cost, num), &cost.currency)
                        {
                            tolerances.observe(
                                cost_currency,
                                ledger.config.tolerance.inferred_from_cost(&per, &num),
                            );
                        }
                    }
                }
            }
        }

        let final_residuals = weight::residuals(weights.iter().flatten());
        let unbalanced = final_residuals.iter().any(|(currency, amount)| {
            amount.abs() > tolerances.resolve(&ledger.config.tolerance, currency)
        });
        if unbalanced {
            let kinds = vec![ErrorKind::TransactionNotBalanced {
                residuals: final_residuals,
                payee,
            }];
            return (locate(kinds), None);
        }

        // Step 6: dry-run every inventory mutation on scratch copies.
        let mut resolved: Vec<ResolvedPosting> = Vec::with_capacity(self.postings.len());
        let mut scratch: HashMap<String, crate::inventory::Inventory> = HashMap::new();
        for (index, posting) in self.postings.iter().enumerate() {
            let num = units[index].num.expect("all amounts resolved by now");
            let currency = units[index]
                .currency
                .clone()
                .expect("all currencies resolved by now");
            let name = posting.account.name();
            let account = &ledger.accounts[&name];
            let inferred_cost = inferred_costs.get(&index).cloned();

            let price_edge = prices[index].as_ref().and_then(|price| {
                let per_unit = if price.total {
                    if num.is_zero() {
                        return None;
                    }
                    price.num.abs() / num.abs()
                } else {
                    price.num
                };
                if per_unit.is_zero() {
                    None
                } else {
                    Some((per_unit, price.currency.clone()))
                }
            });

            let action = if num > Decimal::ZERO {
                Some(LotAction::Add {
                    spec: augmentation_spec(
                        posting.cost.as_ref(),
                        inferred_cost.as_ref(),
                        price_edge.as_ref(),
                        num,
                        self.date,
                    ),
                })
            } else if num < Decimal::ZERO {
                let (spec, method) = reduction_spec(
                    posting.cost.as_ref(),
                    inferred_cost.as_ref(),
                    num,
                    account.booking,
                );
                Some(LotAction::Reduce { spec, method })
            } else {
                None
            };

            if let Some(action) = &action {
                let inventory = scratch
                    .entry(name.clone())
                    .or_insert_with(|| account.inventory.clone());
                match action {
                    LotAction::Add { spec } => inventory.add(&currency, num, spec.clone()),
                    LotAction::Reduce { spec, method } => {
                        if let Err(err) = inventory.reduce_lot(&currency, num, spec.as_ref(), *method) {
                            kinds.push(ErrorKind::InsufficientInventory {
                                posting_index: index,
                                account: name.clone(),
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }

            resolved.push(ResolvedPosting {
                index,
                account: name,
                units: num,
                currency,
                inferred_amount: !units[index].from_input,
                inferred_cost,
                action,
                price_edge,
            });
        }

        if !kinds.is_empty() {
            return (locate(kinds), None);
        }
        (Vec::new(), Some(TransactionDelta { postings: resolved }))
    }

    fn apply(&mut self, ledger: &mut Ledger<'a>, delta: TransactionDelta, index: usize) {
        for rp in delta.postings {
            let posting = &mut self.postings[rp.index];
            if rp.inferred_amount {
                posting.units.num = Some(rp.units);
                posting.units.currency = Some(Cow::Owned(rp.currency.clone()));
                posting.inferred = true;
            } else if posting.units.num.is_none() {
                posting.units.num = Some(rp.units);
            }
            if let Some((per_unit, cost_currency)) = &rp.inferred_cost {
                if let Some(cost) = posting.cost.as_mut() {
                    cost.number_per = Some(*per_unit);
                    cost.currency = Some(Cow::Owned(cost_currency.clone()));
                }
                posting.inferred = true;
            }

            let account = ledger
                .accounts
                .get_mut(&rp.account)
                .expect("validated account exists");
            match &rp.action {
                Some(LotAction::Add { spec }) => {
                    account.inventory.add(&rp.currency, rp.units, spec.clone())
                }
                Some(LotAction::Reduce { spec, method }) => account
                    .inventory
                    .reduce_lot(&rp.currency, rp.units, spec.as_ref(), *method)
                    .expect("dry-run validated this reduction"),
                None => {}
            }
            account.postings.push(AppliedPosting {
                date: self.date,
                units: rp.units,
                currency: rp.currency.clone(),
                txn_index: index,
                posting_index: rp.index,
            });

            ledger.graph.add_node(&rp.currency, NodeKind::Currency, None);
            ledger.graph.add_edge(Edge {
                from: rp.account.clone(),
                to: rp.currency.clone(),
                kind: EdgeKind::TransactionPosting,
                date: Some(self.date),
                rate: None,
                inferred: false,
                valid_until: None,
            });
            if let Some((rate, quote)) = &rp.price_edge {
                ledger.record_price(self.date, &rp.currency, quote, *rate, true);
            }
        }
    }
}

fn resolve_price(
    posting: &beanledger_core::Posting<'_>,
    index: usize,
    kinds: &mut Vec<ErrorKind>,
) -> Option<ResolvedPrice> {
    let price = posting.price.as_ref()?;
    let amount = price.amount();
    let num = match (amount.num, &amount.expr) {
        (Some(num), _) => Some(num),
        (None, Some(expr_text)) => match expr::eval_amount(expr_text) {
            Ok(num) => Some(num),
            Err(err) => {
                kinds.push(ErrorKind::InvalidPrice {
                    posting_index: index,
                    price_spec: expr_text.to_string(),
                    reason: err.to_string(),
                });
                return None;
            }
        },
        (None, None) => None,
    };
    let (num, currency) = match (num, &amount.currency) {
        (Some(num), Some(currency)) => (num, currency.to_string()),
        _ => {
            kinds.push(ErrorKind::InvalidPrice {
                posting_index: index,
                price_spec: String::new(),
                reason: "price needs both an amount and a currency".to_string(),
            });
            return None;
        }
    };
    if num.is_sign_negative() {
        kinds.push(ErrorKind::InvalidPrice {
            posting_index: index,
            price_spec: format!("{} {}", num, currency),
            reason: "price must not be negative".to_string(),
        });
        return None;
    }
    Some(ResolvedPrice {
        num,
        currency,
        total: price.is_total(),
    })
}

/// The lot identity an augmentation books at: the stated cost (normalized
/// to per-unit), an inferred cost, or the price annotation; the acquisition
/// date defaults to the transaction date. Plain currency amounts go to the
/// unconstrained bucket.
fn augmentation_spec(
    cost: Option<&CostSpec<'_>>,
    inferred_cost: Option<&(Decimal, String)>,
    price: Option<&(Decimal, String)>,
    quantity: Decimal,
    txn_date: beanledger_core::Date,
) -> Option<LotSpec> {
    if let Some(cost) = cost {
        let (per_unit, currency) = match inferred_cost {
            Some((per_unit, currency)) => (Some(*per_unit), Some(currency.clone())),
            None => (
                weight::per_unit_cost(cost, quantity),
                cost.currency.as_ref().map(|c| c.to_string()),
            ),
        };
        return Some(LotSpec {
            cost: per_unit,
            cost_currency: currency,
            date: cost.date.or(Some(txn_date)),
            label: cost.label.as_ref().map(|l| l.to_string()),
        });
    }
    if let Some((per_unit, currency)) = price {
        return Some(LotSpec {
            cost: Some(*per_unit),
            cost_currency: Some(currency.clone()),
            date: Some(txn_date),
            label: None,
        });
    }
    None
}

/// The matching spec and booking method for a reduction. Merge costs force
/// the average-cost path; the empty spec books through the account's
/// method; explicit components must match a lot exactly.
fn reduction_spec(
    cost: Option<&CostSpec<'_>>,
    inferred_cost: Option<&(Decimal, String)>,
    quantity: Decimal,
    account_booking: Booking,
) -> (Option<LotSpec>, Booking) {
    match cost {
        None => (None, account_booking),
        Some(cost) if cost.merge => (Some(LotSpec::empty()), Booking::Average),
        Some(cost) if cost.is_empty() => (Some(LotSpec::empty()), account_booking),
        Some(cost) => {
            let (per_unit, currency) = match inferred_cost {
                Some((per_unit, currency)) => (Some(*per_unit), Some(currency.clone())),
                None => (
                    weight::per_unit_cost(cost, quantity),
                    cost.currency.as_ref().map(|c| c.to_string()),
                ),
            };
            (
                Some(LotSpec {
                    cost: per_unit,
                    cost_currency: currency,
                    date: cost.date,
                    label: cost.label.as_ref().map(|l| l.to_string()),
                }),
                account_booking,
            )
        }
    }
}
