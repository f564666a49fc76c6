use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use typed_builder::TypedBuilder;

use super::account::Account;
use super::amount::RawAmount;
use super::flags::Flag;
use super::posting::Posting;
use super::span::SourcePosition;
use super::{Currency, Date, Link, Meta, Tag};

/// The rule selecting which lot is reduced when units are disposed of.
///
/// `Simple` and `Full` are the two process-wide defaults an account inherits
/// when its `open` directive names no method of its own; the remaining
/// variants may also be set per account.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Booking {
    /// No lot tracking beyond a plain running total.
    Simple,
    /// Full lot tracking; ambiguous reductions drain oldest-first.
    Full,
    /// Disable matching entirely; mixed-sign inventories are accepted.
    None,
    /// Reductions must name exactly one lot.
    Strict,
    /// Drain lots oldest-first.
    Fifo,
    /// Drain lots newest-first.
    Lifo,
    /// Merge all lots at their weighted-average cost before reducing.
    Average,
}

impl FromStr for Booking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SIMPLE" => Ok(Booking::Simple),
            "FULL" => Ok(Booking::Full),
            "NONE" => Ok(Booking::None),
            "STRICT" => Ok(Booking::Strict),
            "FIFO" => Ok(Booking::Fifo),
            "LIFO" => Ok(Booking::Lifo),
            "AVERAGE" => Ok(Booking::Average),
            _ => Err(format!("unknown booking method: {}", s)),
        }
    }
}

impl fmt::Display for Booking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Booking::Simple => "SIMPLE",
            Booking::Full => "FULL",
            Booking::None => "NONE",
            Booking::Strict => "STRICT",
            Booking::Fifo => "FIFO",
            Booking::Lifo => "LIFO",
            Booking::Average => "AVERAGE",
        };
        write!(f, "{}", s)
    }
}

/// Enum of all directive types the engine consumes.
#[derive(Clone, Debug, PartialEq)]
pub enum Directive<'a> {
    Open(Open<'a>),
    Close(Close<'a>),
    Transaction(Transaction<'a>),
    Balance(Balance<'a>),
    Pad(Pad<'a>),
    Price(Price<'a>),
    Commodity(Commodity<'a>),
    Note(Note<'a>),
    Document(Document<'a>),
    Event(Event<'a>),
    Custom(Custom<'a>),
    Option(BcOption<'a>),
}

impl<'a> Directive<'a> {
    /// The directive's date; `option` lines carry none.
    pub fn date(&self) -> Option<Date> {
        match self {
            Directive::Open(d) => Some(d.date),
            Directive::Close(d) => Some(d.date),
            Directive::Transaction(d) => Some(d.date),
            Directive::Balance(d) => Some(d.date),
            Directive::Pad(d) => Some(d.date),
            Directive::Price(d) => Some(d.date),
            Directive::Commodity(d) => Some(d.date),
            Directive::Note(d) => Some(d.date),
            Directive::Document(d) => Some(d.date),
            Directive::Event(d) => Some(d.date),
            Directive::Custom(d) => Some(d.date),
            Directive::Option(_) => None,
        }
    }

    pub fn pos(&self) -> &SourcePosition {
        match self {
            Directive::Open(d) => &d.pos,
            Directive::Close(d) => &d.pos,
            Directive::Transaction(d) => &d.pos,
            Directive::Balance(d) => &d.pos,
            Directive::Pad(d) => &d.pos,
            Directive::Price(d) => &d.pos,
            Directive::Commodity(d) => &d.pos,
            Directive::Note(d) => &d.pos,
            Directive::Document(d) => &d.pos,
            Directive::Event(d) => &d.pos,
            Directive::Custom(d) => &d.pos,
            Directive::Option(d) => &d.pos,
        }
    }
}

/// `YYYY-MM-DD open Account [Currency,...] ["BOOKING"]`
///
/// Opens an account as of the given date, optionally constraining the
/// currencies it may hold and the booking method its inventory uses. The
/// booking method is kept as raw text; an unrecognized method is a
/// validation error, not a parse failure.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Open<'a> {
    pub date: Date,

    pub account: Account<'a>,

    /// Commodities the account is allowed to hold. Empty means
    /// unconstrained.
    #[builder(default)]
    pub currencies: Vec<Currency<'a>>,

    #[builder(default)]
    pub booking: Option<Cow<'a, str>>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD close Account`
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Close<'a> {
    pub date: Date,

    pub account: Account<'a>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD balance Account Amount`
///
/// Asserts that the account holds exactly the given number of units of the
/// amount's currency at the start of the given day, within tolerance. Also
/// the trigger point that consumes a pending `pad` for the account.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Balance<'a> {
    pub date: Date,

    pub account: Account<'a>,

    pub amount: RawAmount<'a>,

    /// An explicit `~` tolerance written in the input, overriding the
    /// engine's inferred tolerance.
    #[builder(default)]
    pub tolerance: Option<Decimal>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD pad Account SourceAccount`
///
/// Requests that, when the next balance assertion for `account` arrives, a
/// synthetic transaction be inserted at the pad date moving whatever
/// difference is needed from `source_account` into `account`.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Pad<'a> {
    pub date: Date,

    pub account: Account<'a>,

    pub source_account: Account<'a>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD price Commodity Amount`: one point in the exchange-rate
/// history between two commodities.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Price<'a> {
    pub date: Date,

    /// The commodity being priced (base).
    pub currency: Currency<'a>,

    /// Rate and quote commodity.
    pub amount: RawAmount<'a>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD commodity Currency`: declares a commodity so metadata can be
/// attached to it. Using a commodity never requires declaring it; declared
/// and merely-referenced commodities stay distinguishable in the graph.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Commodity<'a> {
    pub date: Date,

    pub name: Currency<'a>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD note Account "comment"`
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Note<'a> {
    pub date: Date,

    pub account: Account<'a>,

    pub comment: Cow<'a, str>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD document Account "path"`
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Document<'a> {
    pub date: Date,

    pub account: Account<'a>,

    pub path: Cow<'a, str>,

    #[builder(default)]
    pub tags: HashSet<Tag<'a>>,

    #[builder(default)]
    pub links: HashSet<Link<'a>>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD event "name" "value"`: reserved hook, not validated by the
/// core.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Event<'a> {
    pub date: Date,

    pub name: Cow<'a, str>,

    pub description: Cow<'a, str>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD custom "type" ...`: reserved hook, not validated by the
/// core.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct Custom<'a> {
    pub date: Date,

    pub name: Cow<'a, str>,

    #[builder(default)]
    pub args: Vec<Cow<'a, str>>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `option "name" "value"`: a configuration point global to the input.
#[derive(Clone, Debug, Eq, PartialEq, TypedBuilder)]
pub struct BcOption<'a> {
    pub name: Cow<'a, str>,

    pub val: Cow<'a, str>,

    #[builder(default)]
    pub pos: SourcePosition,
}

/// `YYYY-MM-DD [txn|*|!] ["Payee"] "Narration"` followed by postings.
///
/// The flag is preserved as parsed; transactions the ledger synthesizes
/// itself (padding, closing entries) carry [`Flag::Padding`].
#[derive(Clone, Debug, PartialEq, TypedBuilder)]
pub struct Transaction<'a> {
    pub date: Date,

    #[builder(default = Flag::Okay)]
    pub flag: Flag<'a>,

    #[builder(default)]
    pub payee: Option<Cow<'a, str>>,

    #[builder(default)]
    pub narration: Cow<'a, str>,

    #[builder(default)]
    pub tags: HashSet<Tag<'a>>,

    #[builder(default)]
    pub links: HashSet<Link<'a>>,

    #[builder(default)]
    pub postings: Vec<Posting<'a>>,

    #[builder(default)]
    pub meta: Meta<'a>,

    #[builder(default)]
    pub pos: SourcePosition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_parses_every_documented_method() {
        for s in &["SIMPLE", "FULL", "NONE", "STRICT", "FIFO", "LIFO", "AVERAGE"] {
            let parsed: Booking = s.parse().unwrap();
            assert_eq!(parsed.to_string(), *s);
        }
        assert!("fifo".parse::<Booking>().is_err());
        assert!("HIFO".parse::<Booking>().is_err());
    }
}
