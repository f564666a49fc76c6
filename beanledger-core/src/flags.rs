use std::borrow::Cow;
use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Flag<'a> {
    /// `*` or `txn`: a completed transaction.
    Okay,
    /// `!`: needs confirmation or revision.
    Warning,
    /// `P`: a transaction synthesized by the ledger itself (padding,
    /// closing entries). Never produced by user input.
    Padding,
    Other(Cow<'a, str>),
}

impl Default for Flag<'_> {
    fn default() -> Self {
        Flag::Okay
    }
}

impl<'a, I: Into<Cow<'a, str>>> From<I> for Flag<'a> {
    fn from(s: I) -> Self {
        let s = s.into();
        if s == "*" || s == "txn" {
            Flag::Okay
        } else if s == "!" {
            Flag::Warning
        } else if s == "P" {
            Flag::Padding
        } else {
            Flag::Other(s)
        }
    }
}

impl fmt::Display for Flag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Okay => write!(f, "*"),
            Flag::Warning => write!(f, "!"),
            Flag::Padding => write!(f, "P"),
            Flag::Other(s) => write!(f, "{}", s),
        }
    }
}
