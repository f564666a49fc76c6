//! Account state owned by the ledger.

use rust_decimal::Decimal;

use beanledger_core::{AccountType, Booking, Date, OwnedMeta};

use crate::inventory::Inventory;

/// One posting as it was applied to an account, with a back-reference into
/// the ledger's directive list.
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedPosting {
    pub date: Date,
    pub units: Decimal,
    pub currency: String,
    /// Index of the owning transaction in the ledger's directive list.
    pub txn_index: usize,
    /// Index of the posting within that transaction.
    pub posting_index: usize,
}

/// A live account: lifecycle dates, constraints, booking method, holdings
/// and the ordered history of applied postings.
#[derive(Clone, Debug, PartialEq)]
pub struct Account {
    pub name: String,
    pub ty: AccountType,
    pub open_date: Date,
    pub close_date: Option<Date>,
    /// Currencies the account may hold; empty means unconstrained.
    pub currencies: Vec<String>,
    pub booking: Booking,
    pub meta: OwnedMeta,
    pub inventory: Inventory,
    pub postings: Vec<AppliedPosting>,
}

impl Account {
    pub fn new(
        name: String,
        ty: AccountType,
        open_date: Date,
        currencies: Vec<String>,
        booking: Booking,
        meta: OwnedMeta,
    ) -> Self {
        Account {
            name,
            ty,
            open_date,
            close_date: None,
            currencies,
            booking,
            meta,
            inventory: Inventory::new(),
            postings: Vec::new(),
        }
    }

    /// Whether the account accepts activity on a date. The close date
    /// itself still counts as open.
    pub fn is_open_on(&self, date: Date) -> bool {
        date >= self.open_date && self.close_date.map_or(true, |close| date <= close)
    }

    pub fn is_closed(&self) -> bool {
        self.close_date.is_some()
    }

    /// Whether the constraint set admits a currency.
    pub fn accepts_currency(&self, currency: &str) -> bool {
        self.currencies.is_empty() || self.currencies.iter().any(|c| c == currency)
    }

    /// Balance per currency from the applied postings up to and including
    /// `date`.
    pub fn balance_as_of(&self, date: Date) -> Vec<(String, Decimal)> {
        self.balance_in_period(None, Some(date))
    }

    /// Balance per currency from postings inside the window, in currency
    /// order.
    pub fn balance_in_period(&self, start: Option<Date>, end: Option<Date>) -> Vec<(String, Decimal)> {
        let mut totals: std::collections::BTreeMap<&str, Decimal> = std::collections::BTreeMap::new();
        for posting in &self.postings {
            if start.map_or(false, |s| posting.date < s) {
                continue;
            }
            if end.map_or(false, |e| posting.date > e) {
                continue;
            }
            *totals.entry(posting.currency.as_str()).or_insert(Decimal::ZERO) += posting.units;
        }
        totals
            .into_iter()
            .map(|(currency, units)| (currency.to_string(), units))
            .collect()
    }
}
