use std::fmt;

use typed_builder::TypedBuilder;

/// Where a directive came from in the source input.
///
/// Purely informational; it is attached to every directive and echoed on
/// every error so downstream consumers can point back at the input.
#[derive(Clone, Debug, Default, Eq, PartialEq, TypedBuilder)]
pub struct SourcePosition {
    #[builder(default)]
    pub filename: String,
    #[builder(default)]
    pub line: u32,
    #[builder(default)]
    pub column: u32,
}

impl SourcePosition {
    pub fn new(filename: impl Into<String>, line: u32, column: u32) -> Self {
        SourcePosition {
            filename: filename.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}
