//! Read-only traversals over a processed ledger: balances, currency
//! consolidation through the price graph, the hierarchical balance tree and
//! book-closing entries.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use rust_decimal::Decimal;
use thiserror::Error;

use beanledger_core::{
    Account as AstAccount, AccountType, Date, Flag, IncompleteAmount, Posting, Transaction,
};

use crate::ledger::Ledger;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ViewError {
    #[error("no conversion path to {target} for: {}", .currencies.join(", "))]
    NoConversionPath {
        currencies: Vec<String>,
        target: String,
    },
}

/// One node of the hierarchical balance tree. `own` is the balance of
/// postings directly on this account; `total` folds in every descendant.
/// Implicit intermediate accounts appear with an empty `own`.
#[derive(Clone, Debug, PartialEq)]
pub struct BalanceTreeNode {
    /// Full account id (`Assets:US:Checking`).
    pub name: String,
    /// Last path segment (`Checking`).
    pub segment: String,
    pub own: BTreeMap<String, Decimal>,
    pub total: BTreeMap<String, Decimal>,
    pub children: Vec<BalanceTreeNode>,
}

fn merge_into(target: &mut BTreeMap<String, Decimal>, source: &BTreeMap<String, Decimal>) {
    for (currency, units) in source {
        *target.entry(currency.clone()).or_insert(Decimal::ZERO) += *units;
    }
}

impl<'a> Ledger<'a> {
    /// Per-account balances from postings dated on or before `date`.
    pub fn balances_as_of(&self, date: Date) -> BTreeMap<String, Vec<(String, Decimal)>> {
        self.balances_in_period(None, Some(date), &[])
    }

    /// Per-account balances from postings inside the window, optionally
    /// restricted to account types. An empty type list means every type.
    pub fn balances_in_period(
        &self,
        start: Option<Date>,
        end: Option<Date>,
        types: &[AccountType],
    ) -> BTreeMap<String, Vec<(String, Decimal)>> {
        let mut result = BTreeMap::new();
        for (name, account) in &self.accounts {
            if !types.is_empty() && !types.contains(&account.ty) {
                continue;
            }
            let balances = account.balance_in_period(start, end);
            if !balances.is_empty() {
                result.insert(name.clone(), balances);
            }
        }
        result
    }

    /// Consolidates a multi-currency balance into `target`, resolving rates
    /// through the price graph's BFS (so multi-hop conversions work). Zero
    /// amounts are skipped; every unreachable currency is reported in one
    /// aggregated error.
    pub fn convert_balance(
        &self,
        balances: &[(String, Decimal)],
        target: &str,
        as_of: Date,
    ) -> Result<Decimal, ViewError> {
        let mut total = Decimal::ZERO;
        let mut unreachable = Vec::new();
        for (currency, units) in balances {
            if units.is_zero() {
                continue;
            }
            if currency == target {
                total += *units;
                continue;
            }
            match self.graph.convert_amount(*units, currency, target, as_of) {
                Ok(converted) => total += converted,
                Err(_) => unreachable.push(currency.clone()),
            }
        }
        if unreachable.is_empty() {
            Ok(total)
        } else {
            Err(ViewError::NoConversionPath {
                currencies: unreachable,
                target: target.to_string(),
            })
        }
    }

    /// Builds the rooted balance forest: one root per configured account
    /// type that has any matching accounts, children sorted by name, with
    /// implicit intermediate accounts carrying zero own-balance.
    pub fn balance_tree(
        &self,
        types: Option<&[AccountType]>,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Vec<BalanceTreeNode> {
        let selected: Vec<AccountType> = match types {
            Some(types) => types.to_vec(),
            None => AccountType::ALL.to_vec(),
        };

        // Every opened account of a selected type, plus all intermediate
        // prefixes, becomes a node.
        let mut ids: BTreeSet<String> = BTreeSet::new();
        let mut own: BTreeMap<String, BTreeMap<String, Decimal>> = BTreeMap::new();
        for (name, account) in &self.accounts {
            if !selected.contains(&account.ty) {
                continue;
            }
            let balances: BTreeMap<String, Decimal> =
                account.balance_in_period(start, end).into_iter().collect();
            if !balances.is_empty() {
                own.insert(name.clone(), balances);
            }
            let mut prefix = String::new();
            for (depth, part) in name.split(':').enumerate() {
                if depth > 0 {
                    prefix.push(':');
                }
                prefix.push_str(part);
                ids.insert(prefix.clone());
            }
        }

        let roots: HashSet<&str> = selected
            .iter()
            .map(|ty| self.config.account_types.name_of(*ty))
            .collect();
        ids.iter()
            .filter(|id| !id.contains(':') && roots.contains(id.as_str()))
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
            .map(|root| self.build_tree_node(&root, &ids, &own))
            .collect()
    }

    fn build_tree_node(
        &self,
        id: &str,
        ids: &BTreeSet<String>,
        own: &BTreeMap<String, BTreeMap<String, Decimal>>,
    ) -> BalanceTreeNode {
        let prefix = format!("{}:", id);
        let children: Vec<BalanceTreeNode> = ids
            .iter()
            .filter(|candidate| {
                candidate.starts_with(&prefix) && !candidate[prefix.len()..].contains(':')
            })
            .map(|child| self.build_tree_node(child, ids, own))
            .collect();

        let own_balance = own.get(id).cloned().unwrap_or_default();
        let mut total = own_balance.clone();
        for child in &children {
            merge_into(&mut total, &child.total);
        }
        BalanceTreeNode {
            name: id.to_string(),
            segment: id.rsplit(':').next().unwrap_or(id).to_string(),
            own: own_balance,
            total,
            children,
        }
    }

    /// Emits the closing entry for the period ending at `date`: one
    /// synthetic transaction that zeroes every Income and Expenses balance
    /// into the configured earnings account. Returns `None` when there was
    /// no activity to close.
    pub fn close_books(&self, date: Date) -> Option<Transaction<'static>> {
        let mut postings: Vec<Posting<'static>> = Vec::new();
        let mut earnings: BTreeMap<String, Decimal> = BTreeMap::new();

        let mut names: Vec<&String> = self
            .accounts
            .iter()
            .filter(|(_, account)| {
                account.ty == AccountType::Income || account.ty == AccountType::Expenses
            })
            .map(|(name, _)| name)
            .collect();
        names.sort();

        for name in names {
            let account = &self.accounts[name];
            for (currency, units) in account.balance_as_of(date) {
                if units.is_zero() {
                    continue;
                }
                postings.push(plain_posting(name, -units, &currency));
                *earnings.entry(currency).or_insert(Decimal::ZERO) += units;
            }
        }
        if postings.is_empty() {
            return None;
        }

        let earnings_account = self.config.earnings_account();
        for (currency, units) in earnings {
            if units.is_zero() {
                continue;
            }
            postings.push(plain_posting(&earnings_account, units, &currency));
        }

        Some(Transaction {
            date,
            flag: Flag::Padding,
            payee: None,
            narration: Cow::Owned(format!("(Closing books on {})", date.format("%Y-%m-%d"))),
            tags: HashSet::new(),
            links: HashSet::new(),
            postings,
            meta: Vec::new(),
            pos: Default::default(),
        })
    }
}

fn plain_posting(account: &str, units: Decimal, currency: &str) -> Posting<'static> {
    Posting {
        account: AstAccount::new(account.split(':').map(|s| s.to_string()).collect::<Vec<_>>()),
        units: IncompleteAmount {
            expr: None,
            num: Some(units),
            currency: Some(Cow::Owned(currency.to_string())),
        },
        cost: None,
        price: None,
        flag: None,
        meta: Vec::new(),
        inferred: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    use rust_decimal_macros::dec;

    use beanledger_core::{BcOption, Directive, Open, Price, RawAmount};

    use crate::config::Config;
    use crate::ledger::Ledger;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    fn open(d: Date, account: &'static str) -> Directive<'static> {
        Directive::Open(Open {
            date: d,
            account: AstAccount::from_name(account),
            currencies: Vec::new(),
            booking: None,
            meta: Vec::new(),
            pos: Default::default(),
        })
    }

    fn posting(account: &'static str, expr: &'static str, currency: &'static str) -> Posting<'static> {
        Posting {
            account: AstAccount::from_name(account),
            units: IncompleteAmount::from_expr(expr, currency),
            cost: None,
            price: None,
            flag: None,
            meta: Vec::new(),
            inferred: false,
        }
    }

    fn txn(d: Date, narration: &'static str, postings: Vec<Posting<'static>>) -> Directive<'static> {
        Directive::Transaction(Transaction {
            date: d,
            flag: Flag::Okay,
            payee: None,
            narration: Cow::Borrowed(narration),
            tags: Default::default(),
            links: Default::default(),
            postings,
            meta: Vec::new(),
            pos: Default::default(),
        })
    }

    fn price(d: Date, base: &'static str, expr: &'static str, quote: &'static str) -> Directive<'static> {
        Directive::Price(Price {
            date: d,
            currency: Cow::Borrowed(base),
            amount: RawAmount::new(expr, quote),
            meta: Vec::new(),
            pos: Default::default(),
        })
    }

    fn sample_ledger() -> Ledger<'static> {
        let d = date(2024, 1, 1);
        Ledger::process(
            vec![
                open(d, "Assets:US:Checking"),
                open(d, "Assets:US:Savings"),
                open(d, "Income:Salary"),
                open(d, "Expenses:Food"),
                txn(
                    date(2024, 1, 5),
                    "salary",
                    vec![
                        posting("Assets:US:Checking", "2500.00", "USD"),
                        posting("Income:Salary", "-2500.00", "USD"),
                    ],
                ),
                txn(
                    date(2024, 1, 10),
                    "groceries",
                    vec![
                        posting("Expenses:Food", "100.00", "USD"),
                        posting("Assets:US:Checking", "-100.00", "USD"),
                    ],
                ),
                txn(
                    date(2024, 2, 1),
                    "stash",
                    vec![
                        posting("Assets:US:Savings", "500.00", "USD"),
                        posting("Assets:US:Checking", "-500.00", "USD"),
                    ],
                ),
            ],
            Config::default(),
        )
    }

    #[test]
    fn balances_as_of_cut_off_by_date() {
        let ledger = sample_ledger();
        let balances = ledger.balances_as_of(date(2024, 1, 31));
        assert_eq!(
            balances["Assets:US:Checking"],
            vec![("USD".to_string(), dec!(2400.00))]
        );
        assert!(!balances.contains_key("Assets:US:Savings"));

        let later = ledger.balances_as_of(date(2024, 2, 28));
        assert_eq!(
            later["Assets:US:Checking"],
            vec![("USD".to_string(), dec!(1900.00))]
        );
        assert_eq!(later["Assets:US:Savings"], vec![("USD".to_string(), dec!(500.00))]);
    }

    #[test]
    fn period_balances_filter_by_type() {
        let ledger = sample_ledger();
        let expenses = ledger.balances_in_period(
            Some(date(2024, 1, 1)),
            Some(date(2024, 1, 31)),
            &[AccountType::Expenses],
        );
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses["Expenses:Food"], vec![("USD".to_string(), dec!(100.00))]);
    }

    #[test]
    fn multi_hop_conversion_sums_through_the_graph() {
        let ledger = Ledger::process(
            vec![
                price(date(2024, 2, 1), "USD", "0.91", "EUR"),
                price(date(2024, 2, 1), "EUR", "0.86", "GBP"),
            ],
            Config::default(),
        );
        let balances = vec![
            ("USD".to_string(), dec!(100)),
            ("EUR".to_string(), dec!(50)),
            ("GBP".to_string(), dec!(20)),
        ];
        let total = ledger
            .convert_balance(&balances, "GBP", date(2024, 2, 1))
            .unwrap();
        let expected = dec!(20) + dec!(50) * dec!(0.86) + dec!(100) * dec!(0.91) * dec!(0.86);
        assert_eq!(total, expected);
    }

    #[test]
    fn conversion_skips_zeros_and_aggregates_failures() {
        let ledger = Ledger::process(
            vec![price(date(2024, 2, 1), "USD", "0.91", "EUR")],
            Config::default(),
        );
        let balances = vec![
            ("JPY".to_string(), dec!(1000)),
            ("CHF".to_string(), dec!(0)),
            ("USD".to_string(), dec!(10)),
            ("AUD".to_string(), dec!(5)),
        ];
        match ledger.convert_balance(&balances, "EUR", date(2024, 2, 1)) {
            Err(ViewError::NoConversionPath { currencies, target }) => {
                assert_eq!(currencies, vec!["JPY".to_string(), "AUD".to_string()]);
                assert_eq!(target, "EUR");
            }
            other => panic!("expected NoConversionPath, got {:?}", other),
        }
    }

    #[test]
    fn balance_tree_includes_implicit_intermediates() {
        let ledger = sample_ledger();
        let tree = ledger.balance_tree(Some(&[AccountType::Assets]), None, None);
        assert_eq!(tree.len(), 1);
        let assets = &tree[0];
        assert_eq!(assets.name, "Assets");
        assert!(assets.own.is_empty());
        assert_eq!(assets.total["USD"], dec!(2400.00));

        let us = &assets.children[0];
        assert_eq!(us.name, "Assets:US");
        assert!(us.own.is_empty());
        assert_eq!(us.total["USD"], dec!(2400.00));

        let names: Vec<&str> = us.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Assets:US:Checking", "Assets:US:Savings"]);
        assert_eq!(us.children[0].own["USD"], dec!(1900.00));
        assert_eq!(us.children[0].segment, "Checking");
    }

    #[test]
    fn close_books_offsets_income_and_expenses() {
        let ledger = sample_ledger();
        let closing = ledger.close_books(date(2024, 12, 31)).unwrap();
        assert_eq!(closing.flag, Flag::Padding);
        assert_eq!(closing.postings.len(), 3);
        // Expenses:Food holds 100, Income:Salary holds -2500; earnings
        // receives the -2400 sum.
        let by_account: Vec<(String, Decimal)> = closing
            .postings
            .iter()
            .map(|p| (p.account.name(), p.units.num.unwrap()))
            .collect();
        assert!(by_account.contains(&("Expenses:Food".to_string(), dec!(-100.00))));
        assert!(by_account.contains(&("Income:Salary".to_string(), dec!(2500.00))));
        assert!(by_account.contains(&("Equity:Earnings".to_string(), dec!(-2400.00))));
    }

    #[test]
    fn close_books_is_empty_without_activity() {
        let ledger = Ledger::process(
            vec![open(date(2024, 1, 1), "Assets:Cash")],
            Config::default(),
        );
        assert!(ledger.close_books(date(2024, 12, 31)).is_none());
    }

    #[test]
    fn close_books_honors_renamed_equity_root() {
        let d = date(2024, 1, 1);
        let ledger = Ledger::process(
            vec![
                Directive::Option(BcOption {
                    name: Cow::Borrowed("name_equity"),
                    val: Cow::Borrowed("Capital"),
                    pos: Default::default(),
                }),
                open(d, "Assets:Cash"),
                open(d, "Income:Salary"),
                txn(
                    date(2024, 1, 5),
                    "salary",
                    vec![
                        posting("Assets:Cash", "100.00", "USD"),
                        posting("Income:Salary", "-100.00", "USD"),
                    ],
                ),
            ],
            Config::default(),
        );
        let closing = ledger.close_books(date(2024, 12, 31)).unwrap();
        assert!(closing
            .postings
            .iter()
            .any(|p| p.account.name() == "Capital:Earnings"));
    }
}
