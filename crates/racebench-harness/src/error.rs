//! Error types for the collection pipeline.
//!
//! Nothing here is retried: the analyzer is assumed deterministic given its
//! inputs, so every failure is surfaced to the operator with enough context
//! to reproduce it, and the batch run terminates. Partial progress survives
//! only through the store's per-row durability.

use std::backtrace::Backtrace;
use std::{fmt, io};

/// Error type for the run/extract/persist pipeline.
///
/// Uses the struct-with-private-kind pattern: callers classify via the
/// `is_xxx()` helpers instead of matching on an exposed enum.
#[derive(Debug)]
pub struct HarnessError {
    kind: HarnessErrorKind,
    backtrace: Backtrace,
}

#[derive(Debug)]
pub(crate) enum HarnessErrorKind {
    /// The external process could not be started.
    Spawn { args: Vec<String>, source: io::Error },
    /// The external process exited non-zero. Carries the full argv so the
    /// operator can reproduce the invocation.
    Process { args: Vec<String>, code: Option<i32> },
    /// A field's pattern matched no line of the captured output.
    FieldNotFound { field: String },
    /// A field's pattern matched more than one line; patterns are required
    /// to be anchored to at most one line per invocation.
    AmbiguousField { field: String, matches: usize },
    /// A field definition's pattern is not a valid single-capture regex.
    InvalidPattern { field: String, reason: String },
    /// A captured value did not parse as its declared kind.
    Malformed { field: String, text: String },
    /// A store file's header does not match the expected schema.
    SchemaMismatch { expected: Vec<String>, found: Vec<String> },
    /// A store cell did not parse back as its column's kind.
    BadCell { column: String, row: usize, text: String },
    /// I/O error reading or writing the store.
    Io(io::Error),
    /// CSV-layer error reading or writing the store.
    Csv(csv::Error),
}

impl HarnessError {
    pub(crate) fn new(kind: HarnessErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// True if an external invocation failed to start or exited non-zero.
    pub fn is_process(&self) -> bool {
        matches!(
            self.kind,
            HarnessErrorKind::Spawn { .. } | HarnessErrorKind::Process { .. }
        )
    }

    /// True if a field's pattern matched no line.
    pub fn is_field_not_found(&self) -> bool {
        matches!(self.kind, HarnessErrorKind::FieldNotFound { .. })
    }

    /// True if a field's pattern matched more than one line.
    pub fn is_ambiguous_field(&self) -> bool {
        matches!(self.kind, HarnessErrorKind::AmbiguousField { .. })
    }

    /// True if a store header disagreed with the expected schema.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self.kind, HarnessErrorKind::SchemaMismatch { .. })
    }

    /// The backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            HarnessErrorKind::Spawn { args, source } => {
                write!(
                    f,
                    "failed to start `{}`: {source}",
                    args.join(" ")
                )
            }
            HarnessErrorKind::Process { args, code } => match code {
                Some(code) => write!(
                    f,
                    "`{}` exited with status {code}",
                    args.join(" ")
                ),
                None => write!(
                    f,
                    "`{}` was terminated by a signal",
                    args.join(" ")
                ),
            },
            HarnessErrorKind::FieldNotFound { field } => {
                write!(
                    f,
                    "field `{field}` not found in analyzer output"
                )
            }
            HarnessErrorKind::AmbiguousField { field, matches } => {
                write!(
                    f,
                    "field `{field}` matched {matches} lines; patterns must \
                     match at most one line per invocation"
                )
            }
            HarnessErrorKind::InvalidPattern { field, reason } => {
                write!(f, "invalid pattern for field `{field}`: {reason}")
            }
            HarnessErrorKind::Malformed { field, text } => {
                write!(
                    f,
                    "field `{field}` captured unparseable value `{text}`"
                )
            }
            HarnessErrorKind::SchemaMismatch { expected, found } => {
                write!(
                    f,
                    "store header does not match expected schema\n  \
                     expected: {}\n  found:    {}",
                    expected.join(","),
                    found.join(",")
                )
            }
            HarnessErrorKind::BadCell { column, row, text } => {
                write!(
                    f,
                    "store row {row} column `{column}` holds unparseable \
                     value `{text}`"
                )
            }
            HarnessErrorKind::Io(err) => write!(f, "I/O error: {err}"),
            HarnessErrorKind::Csv(err) => write!(f, "CSV error: {err}"),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            HarnessErrorKind::Spawn { source, .. } => Some(source),
            HarnessErrorKind::Io(err) => Some(err),
            HarnessErrorKind::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for HarnessError {
    fn from(err: io::Error) -> Self {
        Self::new(HarnessErrorKind::Io(err))
    }
}

impl From<csv::Error> for HarnessError {
    fn from(err: csv::Error) -> Self {
        Self::new(HarnessErrorKind::Csv(err))
    }
}
