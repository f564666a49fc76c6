use std::borrow::Cow;
use std::fmt;

use typed_builder::TypedBuilder;

/// A colon-separated account path such as `Assets:US:Checking`.
///
/// The first segment is the account-type root. It is kept as raw text here
/// because the set of valid roots is configurable per process; resolving a
/// segment to an [`AccountType`](crate::AccountType) is the engine's job, and
/// an unknown root must surface as a validation error rather than fail at
/// construction time.
#[derive(Clone, Debug, Eq, PartialEq, Hash, TypedBuilder)]
pub struct Account<'a> {
    /// All path segments, root first. Never empty.
    pub parts: Vec<Cow<'a, str>>,
}

impl<'a> Account<'a> {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'a, str>>,
    {
        Account {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a full `Root:Sub:Leaf` name into its segments.
    pub fn from_name(name: &'a str) -> Self {
        Account {
            parts: name.split(':').map(Cow::Borrowed).collect(),
        }
    }

    /// The root segment (`Assets` in `Assets:US:Checking`).
    pub fn root(&self) -> &str {
        self.parts.first().map(|p| p.as_ref()).unwrap_or("")
    }

    /// The full colon-joined name.
    pub fn name(&self) -> String {
        self.parts.join(":")
    }

    /// The name of the immediate parent, or `None` for a root account.
    pub fn parent_name(&self) -> Option<String> {
        if self.parts.len() <= 1 {
            None
        } else {
            Some(self.parts[..self.parts.len() - 1].join(":"))
        }
    }

    pub fn to_static(&self) -> Account<'static> {
        Account {
            parts: self
                .parts
                .iter()
                .map(|p| Cow::Owned(p.clone().into_owned()))
                .collect(),
        }
    }
}

impl fmt::Display for Account<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join(":"))
    }
}
