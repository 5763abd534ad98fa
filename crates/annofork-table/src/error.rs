//! Error types for tables and the CSV codec
//!
//! - [`TableError`]: structural misuse of an in-memory table
//! - [`ParseError`]: CSV text that could not be turned into a table
//! - [`RowDiagnostic`]: non-fatal, row-level parse findings
//! - [`ReviewerError`]: reviewer names that cannot scope columns or folders

use std::fmt::{self, Display, Formatter};

/// Errors from table mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// Field name declared twice
    #[error("duplicate field: '{0}'")]
    DuplicateField(String),

    /// Field not in the header
    #[error("unknown field: '{0}'")]
    UnknownField(String),

    /// Row width does not match the header
    #[error("row has {actual} values, header has {expected}")]
    RowLength { expected: usize, actual: usize },

    /// Row index past the end
    #[error("row {row} out of range (table has {len} rows)")]
    RowOutOfRange { row: usize, len: usize },
}

/// Kind of row-level finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Row has fewer values than the header
    TooFewFields,
    /// Row has more values than the header
    TooManyFields,
    /// Quoted field never closed before end of input
    MissingQuotes,
    /// Characters between a closing quote and the next delimiter
    InvalidQuotes,
    /// Header repeats a name; the later one was renamed
    DuplicateHeader,
}

impl DiagnosticKind {
    /// Whether the affected row was dropped from the result
    #[inline]
    #[must_use]
    pub fn drops_row(self) -> bool {
        !matches!(self, Self::DuplicateHeader)
    }
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TooFewFields => "too few fields",
            Self::TooManyFields => "too many fields",
            Self::MissingQuotes => "missing closing quote",
            Self::InvalidQuotes => "invalid quotes",
            Self::DuplicateHeader => "duplicate header",
        };
        f.write_str(s)
    }
}

/// A non-fatal finding attached to one line of input
///
/// `line` is the 1-based physical line where the record started (the header
/// is line 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDiagnostic {
    /// Start line of the offending record
    pub line: usize,
    /// What went wrong
    pub kind: DiagnosticKind,
    /// Human-readable detail
    pub message: String,
}

impl RowDiagnostic {
    pub(crate) fn new(line: usize, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            message: message.into(),
        }
    }
}

impl Display for RowDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.kind, self.message)
    }
}

/// Errors that prevent a usable table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Header line itself is malformed
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Caller asked for a clean parse and the codec reported findings
    #[error("{} row diagnostic(s), first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Diagnostics(Vec<RowDiagnostic>),
}

/// Invalid reviewer names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewerError {
    /// Empty or whitespace-only
    #[error("reviewer name is empty")]
    Empty,

    /// Contains a path separator, control character or reserved name
    #[error("reviewer name '{0}' cannot be used as a folder name")]
    InvalidCharacters(String),

    /// Leading or trailing whitespace
    #[error("reviewer name '{0}' has surrounding whitespace")]
    Untrimmed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_error_display() {
        let err = TableError::RowLength {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "row has 2 values, header has 3");
    }

    #[test]
    fn diagnostics_display_first_finding() {
        let err = ParseError::Diagnostics(vec![RowDiagnostic::new(
            4,
            DiagnosticKind::TooFewFields,
            "expected 3, got 2",
        )]);
        assert_eq!(
            err.to_string(),
            "1 row diagnostic(s), first: line 4: too few fields: expected 3, got 2"
        );
    }

    #[test]
    fn duplicate_header_keeps_rows() {
        assert!(!DiagnosticKind::DuplicateHeader.drops_row());
        assert!(DiagnosticKind::MissingQuotes.drops_row());
    }
}
