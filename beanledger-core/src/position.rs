use std::borrow::Cow;

use rust_decimal::Decimal;
use typed_builder::TypedBuilder;

use super::amount::IncompleteAmount;
use super::{Currency, Date};

/// The cost annotation on a posting: `{100.00 USD}`, `{100.00 USD, 2020-01-02}`,
/// `{{1000.00 USD}}` (total), `{}` (to be inferred) or `{*}` (merge).
///
/// An all-empty, non-merge spec is the `{}` form and asks the engine to infer
/// a per-unit cost that balances the transaction; the merge form asks for
/// average-cost booking. `number_total` and `number_per` are mutually
/// exclusive in well-formed input.
#[derive(Clone, Debug, Default, Eq, PartialEq, TypedBuilder)]
pub struct CostSpec<'a> {
    #[builder(default)]
    pub number_per: Option<Decimal>,

    #[builder(default)]
    pub number_total: Option<Decimal>,

    #[builder(default)]
    pub currency: Option<Currency<'a>>,

    /// Acquisition date of the lot, for lot matching.
    #[builder(default)]
    pub date: Option<Date>,

    /// User label for the lot, for lot matching.
    #[builder(default)]
    pub label: Option<Cow<'a, str>>,

    /// The `{*}` form: merge all lots at average cost before reducing.
    #[builder(default)]
    pub merge: bool,
}

impl CostSpec<'_> {
    /// The `{}` form: every component absent and not a merge.
    pub fn is_empty(&self) -> bool {
        self.number_per.is_none()
            && self.number_total.is_none()
            && self.currency.is_none()
            && self.date.is_none()
            && self.label.is_none()
            && !self.merge
    }
}

/// The price annotation on a posting: `@ 1.09 CAD` (per unit) or
/// `@@ 436.01 CAD` (total).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PriceSpec<'a> {
    PerUnit(IncompleteAmount<'a>),
    Total(IncompleteAmount<'a>),
}

impl<'a> PriceSpec<'a> {
    pub fn amount(&self) -> &IncompleteAmount<'a> {
        match self {
            PriceSpec::PerUnit(a) | PriceSpec::Total(a) => a,
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(self, PriceSpec::Total(_))
    }
}
