use typed_builder::TypedBuilder;

use super::account::Account;
use super::amount::IncompleteAmount;
use super::flags::Flag;
use super::position::{CostSpec, PriceSpec};
use super::Meta;

/// A single account-affecting line inside a transaction.
///
/// The amount may be elided in the input; when the engine infers it (or an
/// empty cost) during balancing, the resolved values are written back here
/// and `inferred` is set so reporting can distinguish user input from
/// engine-completed data.
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
pub struct Posting<'a> {
    pub account: Account<'a>,

    #[builder(default)]
    pub units: IncompleteAmount<'a>,

    #[builder(default)]
    pub cost: Option<CostSpec<'a>>,

    #[builder(default)]
    pub price: Option<PriceSpec<'a>>,

    #[builder(default)]
    pub flag: Option<Flag<'a>>,

    #[builder(default)]
    pub meta: Meta<'a>,

    /// Set by the engine when the amount or cost was inferred rather than
    /// written by the user.
    #[builder(default)]
    pub inferred: bool,
}
