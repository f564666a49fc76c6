use std::borrow::Cow;
use std::convert::TryFrom;
use std::fmt;

use rust_decimal::Decimal;
use typed_builder::TypedBuilder;

use super::Currency;

/// A resolved number of units of a commodity.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Amount<'a> {
    pub num: Decimal,
    pub currency: Currency<'a>,
}

impl<'a> Amount<'a> {
    pub fn new(num: Decimal, currency: impl Into<Currency<'a>>) -> Self {
        Amount {
            num,
            currency: currency.into(),
        }
    }

    pub fn to_static(&self) -> Amount<'static> {
        Amount {
            num: self.num,
            currency: Cow::Owned(self.currency.clone().into_owned()),
        }
    }
}

impl fmt::Display for Amount<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.num, self.currency)
    }
}

/// An amount as delivered by the parser: the numeric part is the raw text,
/// which may be a plain decimal (`120.50`) or a parenthesized arithmetic
/// expression (`(100.00 + 20.50)`). The engine's expression evaluator turns
/// it into a [`Decimal`].
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct RawAmount<'a> {
    pub expr: Cow<'a, str>,
    pub currency: Currency<'a>,
}

impl<'a> RawAmount<'a> {
    pub fn new(expr: impl Into<Cow<'a, str>>, currency: impl Into<Currency<'a>>) -> Self {
        RawAmount {
            expr: expr.into(),
            currency: currency.into(),
        }
    }
}

/// Posting units, any part of which may be missing in the input.
///
/// `expr` is the textual value as written (if any); `num` is its evaluated
/// form, filled in by the engine. A posting whose amount was left out
/// entirely (elided, to be inferred from the transaction residual) has all
/// three fields empty until inference writes `num` and `currency` back.
#[derive(Clone, Debug, Default, Eq, PartialEq, TypedBuilder)]
pub struct IncompleteAmount<'a> {
    #[builder(default)]
    pub expr: Option<Cow<'a, str>>,

    #[builder(default)]
    pub num: Option<Decimal>,

    #[builder(default)]
    pub currency: Option<Currency<'a>>,
}

impl<'a> IncompleteAmount<'a> {
    /// An amount written out in the source.
    pub fn from_expr(expr: impl Into<Cow<'a, str>>, currency: impl Into<Currency<'a>>) -> Self {
        IncompleteAmount {
            expr: Some(expr.into()),
            num: None,
            currency: Some(currency.into()),
        }
    }

    /// True when the posting carried no amount at all.
    pub fn is_elided(&self) -> bool {
        self.expr.is_none() && self.num.is_none()
    }
}

impl<'a> TryFrom<IncompleteAmount<'a>> for Amount<'a> {
    type Error = ();

    fn try_from(val: IncompleteAmount<'a>) -> Result<Self, Self::Error> {
        match val {
            IncompleteAmount {
                num: Some(num),
                currency: Some(currency),
                ..
            } => Ok(Amount { num, currency }),
            _ => Err(()),
        }
    }
}

impl<'a> From<Amount<'a>> for IncompleteAmount<'a> {
    fn from(val: Amount<'a>) -> Self {
        IncompleteAmount {
            expr: None,
            num: Some(val.num),
            currency: Some(val.currency),
        }
    }
}
