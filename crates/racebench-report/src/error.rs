//! Error types for the analysis pass.
//!
//! The engine does not silently mask bad inputs: a zero baseline raises a
//! division-by-zero error and a negative decomposition share raises a
//! measurement-inversion error. The report layer is responsible for
//! pre-filtering degenerate traces, so the absence of these errors from a
//! finished report is itself a signal that filtering was applied.

use std::{fmt, io};

use racebench_harness::HarnessError;

/// Error type for derived-metric computation and report rendering.
#[derive(Debug)]
pub struct ReportError {
    kind: ReportErrorKind,
}

#[derive(Debug)]
pub(crate) enum ReportErrorKind {
    /// A ratio's baseline metric was zero.
    DivisionByZero { metric: String },
    /// A stacked decomposition produced a negative share: the cumulative
    /// timings were not monotonically increasing.
    MeasurementInversion { shares: [f64; 3] },
    /// The analysis pass expects a column the store schema does not carry.
    MissingColumn { column: String },
    /// A record lacks a value for a schema column (cannot happen for
    /// stores written by this harness; guards against hand-edited files).
    MissingMetric { trace: String, column: String },
    /// Reading a store back failed.
    Store(HarnessError),
    /// I/O error writing an artifact.
    Io(io::Error),
    /// CSV-layer error writing a secondary table.
    Csv(csv::Error),
}

impl ReportError {
    pub(crate) fn new(kind: ReportErrorKind) -> Self {
        Self { kind }
    }

    /// True if a ratio baseline was zero.
    pub fn is_division_by_zero(&self) -> bool {
        matches!(self.kind, ReportErrorKind::DivisionByZero { .. })
    }

    /// True if a decomposition surfaced non-monotonic timings.
    pub fn is_measurement_inversion(&self) -> bool {
        matches!(self.kind, ReportErrorKind::MeasurementInversion { .. })
    }

    /// True if a report referenced a column absent from the schema.
    pub fn is_missing_column(&self) -> bool {
        matches!(self.kind, ReportErrorKind::MissingColumn { .. })
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ReportErrorKind::DivisionByZero { metric } => {
                write!(
                    f,
                    "baseline metric `{metric}` is zero; filter degenerate \
                     traces before computing ratios"
                )
            }
            ReportErrorKind::MeasurementInversion { shares } => {
                write!(
                    f,
                    "cumulative timings are not monotonic; decomposition \
                     shares {shares:?} contain a negative value"
                )
            }
            ReportErrorKind::MissingColumn { column } => {
                write!(
                    f,
                    "report references column `{column}` which the store \
                     schema does not define"
                )
            }
            ReportErrorKind::MissingMetric { trace, column } => {
                write!(f, "trace `{trace}` has no value for `{column}`")
            }
            ReportErrorKind::Store(err) => {
                write!(f, "failed to read store: {err}")
            }
            ReportErrorKind::Io(err) => write!(f, "I/O error: {err}"),
            ReportErrorKind::Csv(err) => write!(f, "CSV error: {err}"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ReportErrorKind::Store(err) => Some(err),
            ReportErrorKind::Io(err) => Some(err),
            ReportErrorKind::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HarnessError> for ReportError {
    fn from(err: HarnessError) -> Self {
        Self::new(ReportErrorKind::Store(err))
    }
}

impl From<io::Error> for ReportError {
    fn from(err: io::Error) -> Self {
        Self::new(ReportErrorKind::Io(err))
    }
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        Self::new(ReportErrorKind::Csv(err))
    }
}
