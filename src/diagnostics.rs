//! Rejection reasons and locations reported to a path's author.

use serde::Serialize;
use std::fmt;

/// Why a path specification was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Reason {
    /// The text does not parse as a path expression.
    Malformed,
    /// Not a fresh inline closure (a stored value, a call result, ...).
    NotInline,
    /// A method call or index access appears in the chain.
    OnlyFieldOrPropertyAllowed,
    /// The chain is not rooted at the closure parameter.
    ParameterUnused,
    /// The closure body is the bare parameter.
    EmptyPath,
    /// The closure parameter is annotated with a type other than the root.
    ParameterTypeMismatch,
    UnknownType,
    UnknownMember,
    /// The root type cannot be named from the dispatch scope.
    UnreachableRoot,
    /// A restricted path was declared without a scope that could host it.
    InaccessibleMember,
}

impl Reason {
    /// Stable short code for reports.
    pub fn code(self) -> &'static str {
        match self {
            Reason::Malformed => "CW000",
            Reason::NotInline => "CW001",
            Reason::OnlyFieldOrPropertyAllowed => "CW002",
            Reason::ParameterUnused => "CW003",
            Reason::EmptyPath => "CW004",
            Reason::ParameterTypeMismatch => "CW005",
            Reason::UnknownType => "CW006",
            Reason::UnknownMember => "CW007",
            Reason::UnreachableRoot => "CW008",
            Reason::InaccessibleMember => "CW009",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 1-based source position. `line` is 0 when the path did not come from a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub reason: Reason,
    pub location: Location,
    /// Short context, usually the offending member or type name.
    pub detail: String,
}

impl Rejection {
    pub fn new(reason: Reason, location: Location, detail: impl Into<String>) -> Self {
        Self {
            reason,
            location,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {}: {}",
            self.reason.code(),
            self.reason,
            self.location,
            self.detail
        )
    }
}
