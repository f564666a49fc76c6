use std::borrow::Cow;

use rust_decimal::Decimal;

/// Metadata attached to directives and postings.
///
/// Kept as an ordered list of pairs rather than a map: the validation layer
/// must be able to see duplicate keys exactly as they appeared in the input
/// in order to report them.
pub type Meta<'a> = Vec<(Cow<'a, str>, MetaValue<'a>)>;

/// Metadata detached from the input text, for state the engine owns beyond
/// the lifetime of a single directive (accounts, graph nodes).
pub type OwnedMeta = Vec<(String, MetaValue<'static>)>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MetaValue<'a> {
    Text(Cow<'a, str>),
    Account(super::account::Account<'a>),
    Date(super::Date),
    Currency(super::Currency<'a>),
    Tag(Tag<'a>),
    Bool(bool),
    Amount(super::amount::Amount<'a>),
    Number(Decimal),
}

impl MetaValue<'_> {
    pub fn to_static(&self) -> MetaValue<'static> {
        match self {
            MetaValue::Text(s) => MetaValue::Text(Cow::Owned(s.clone().into_owned())),
            MetaValue::Account(a) => MetaValue::Account(a.to_static()),
            MetaValue::Date(d) => MetaValue::Date(*d),
            MetaValue::Currency(c) => MetaValue::Currency(Cow::Owned(c.clone().into_owned())),
            MetaValue::Tag(t) => MetaValue::Tag(Cow::Owned(t.clone().into_owned())),
            MetaValue::Bool(b) => MetaValue::Bool(*b),
            MetaValue::Amount(a) => MetaValue::Amount(a.to_static()),
            MetaValue::Number(n) => MetaValue::Number(*n),
        }
    }
}

/// Detaches a borrowed metadata list from its source text.
pub fn meta_to_owned(meta: &Meta<'_>) -> OwnedMeta {
    meta.iter()
        .map(|(k, v)| (k.clone().into_owned(), v.to_static()))
        .collect()
}

/// Tag attached to a transaction (`#berlin-trip-2014`).
pub type Tag<'a> = Cow<'a, str>;

/// Link grouping related transactions over time (`^invoice-jan14`).
pub type Link<'a> = Cow<'a, str>;
