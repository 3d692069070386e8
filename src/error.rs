// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use std::sync::Arc;

/// Errors produced while parsing, binding, traversing or projecting selections.
///
/// The optional `path` lists the field names (outermost first) at which the
/// error happened. Inner errors accumulate outer names through
/// [`Error::register`] as they propagate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    path: Vec<Arc<str>>,
    kind: ErrorKind,
}

/// The kind of an [`Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A `}` without a matching `{`.
    #[error("unexpected closing brace at index {index} in \"{expr}\"")]
    UnexpectedClosingBrace { index: usize, expr: String },

    /// A `{` that is never closed.
    #[error("missing closing brace in \"{expr}\"")]
    MissingClosingBrace { expr: String },

    /// A field part with more than a name and one nested block.
    #[error("failed parsing \"{part}\": contains more than one space")]
    MoreThanOneSpace { part: String },

    /// A nested block with no field name in front of it.
    #[error("failed parsing \"{part}\": missing field name")]
    MissingFieldName { part: String },

    /// Field names that the bound record does not declare.
    #[error("unrecognized field(s): {}", fmt_list_and(fields))]
    UnrecognizedFields { fields: Vec<Arc<str>> },

    /// A nested selection given to a field that has no nested record.
    #[error("expected undefined selection for non-fragmentable field \"{field}\", but received \"{expr}\"")]
    NotFragmentable { field: Arc<str>, expr: String },

    /// A selection or value bound to another record than the one expected.
    #[error("type mismatch: expected {expected}, but received {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A field that cannot be resolved by name or index.
    #[error("unknown field {field} in record {record}")]
    UnknownField { field: String, record: Arc<str> },

    /// Input that cannot be turned into a selection.
    #[error("cannot parse selection from {0}")]
    InvalidInput(String),

    /// A value that cannot be converted to a target type.
    #[error("cannot convert {value} to {target}")]
    Conversion { value: String, target: String },

    /// A malformed schema document.
    #[error("invalid schema: {0}")]
    Schema(String),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            path: Vec::new(),
            kind,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Field names leading to the failing location, outermost first.
    pub fn path(&self) -> &[Arc<str>] {
        &self.path
    }

    /// Prefix the error path with the name of an enclosing field.
    #[must_use]
    pub fn register(mut self, field: impl Into<Arc<str>>) -> Self {
        self.path.insert(0, field.into());
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "{}", self.kind);
        }
        write!(f, "{} ({})", self.kind, self.path.join("."))
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Formats names like `"a", "b", and "c"`.
pub(crate) fn fmt_list_and(items: &[Arc<str>]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("\"{i}\"")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} and {b}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}
