use std::borrow::Cow;

pub use account::Account;
pub use account_types::AccountType;
pub use amount::{Amount, IncompleteAmount, RawAmount};
pub use date::Date;
pub use directives::*;
pub use flags::Flag;
pub use metadata::{Link, Meta, MetaValue, OwnedMeta, Tag};
pub use position::{CostSpec, PriceSpec};
pub use posting::Posting;
pub use span::SourcePosition;

pub mod account;
pub mod account_types;
pub mod amount;
mod date;
pub mod directives;
pub mod flags;
pub mod metadata;
pub mod position;
pub mod posting;
pub mod span;

pub type Currency<'a> = Cow<'a, str>;
