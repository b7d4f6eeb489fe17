//! The declarative report manifest.
//!
//! Each item describes one derived table or chart over a result store:
//! which columns feed it, how degenerate traces are filtered out, and where
//! the artifact is written. A manifest plus a variant set fully determines
//! an analysis pass, so adding a report means adding data, not a script.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A scalar metric drawn from a record.
///
/// Either a column value directly, or the sum of a series column (e.g. the
/// total dependency count across threads).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MetricRef {
    /// A scalar column, read as f64.
    Column { column: String },
    /// The sum of a series column's entries.
    SeriesSum { column: String },
}

impl MetricRef {
    /// The underlying column name.
    pub fn column(&self) -> &str {
        match self {
            MetricRef::Column { column } | MetricRef::SeriesSum { column } => {
                column
            }
        }
    }
}

/// A (full time, phase time) column pair for one variant, with a label
/// used in chart legends and table rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasePair {
    pub label: String,
    /// Column holding the full wall time in milliseconds.
    pub full: String,
    /// Column holding the phase-2 time in milliseconds.
    pub phase: String,
}

/// One report artifact: a chart or a secondary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSpec {
    /// Normalized stacked bar of sibling event counters per trace, plus an
    /// optional raw-counts table.
    EventTypeBreakdown {
        /// Counter columns normalized to percentages of their sum.
        counters: Vec<String>,
        chart: String,
        #[serde(default)]
        table: Option<String>,
    },
    /// Grouped bar of phase time as a percentage of full time, one group
    /// per trace, one bar per variant.
    PhaseShare {
        pairs: Vec<PhasePair>,
        /// Traces with a baseline full time below this are skipped.
        #[serde(default)]
        min_full_ms: i64,
        chart: String,
    },
    /// Stacked decomposition of three cumulative full times (baseline,
    /// baseline+overhead-1, baseline+overhead-1+overhead-2) into three
    /// percentage shares.
    StackedTiming {
        /// The three cumulative timing columns, in increasing order.
        cumulative: [String; 3],
        /// Legend labels for the three shares.
        labels: [String; 3],
        #[serde(default)]
        min_ms: i64,
        chart: String,
    },
    /// Bar of the relative overhead of one metric versus a baseline,
    /// `(contender - baseline) / baseline * 100`.
    OverheadRatio {
        label: String,
        baseline: MetricRef,
        contender: MetricRef,
        /// Traces whose baseline metric is at or below this are skipped,
        /// which also keeps zero baselines out of the ratio.
        #[serde(default)]
        min_baseline: f64,
        chart: String,
    },
    /// Boxplot of per-thread distributions, one box per trace, values
    /// normalized to percentages of the trace's total.
    DepsBoxplot {
        /// The series column to plot.
        column: String,
        /// Traces whose series sums below this are excluded.
        #[serde(default)]
        min_sum: u64,
        /// Minimum number of threads for a meaningful box.
        #[serde(default = "default_min_threads")]
        min_threads: usize,
        chart: String,
    },
    /// Line chart of one metric across stores collected at different
    /// build-limit values, one line per trace.
    LimitSweep {
        metric: MetricRef,
        /// The config parameter providing the x value of each store.
        param: String,
        /// The store files to read, one per parameter value.
        stores: Vec<PathBuf>,
        #[serde(default = "default_true")]
        log_x: bool,
        chart: String,
    },
    /// Per-trace dependency sums and dash-joined per-thread lists.
    DepsTable {
        /// Series columns, one (sum, list) column pair each.
        columns: Vec<String>,
        output: String,
    },
    /// Per-trace race counts, total event count, and lock count.
    TraceInfoTable {
        races: Vec<String>,
        events: Vec<String>,
        locks: String,
        output: String,
    },
    /// Per-(trace, variant) full/phase-1/phase-2 timing rows.
    TimingTable {
        variants: Vec<PhasePair>,
        #[serde(default)]
        min_full_ms: i64,
        output: String,
    },
    /// Vector-clock limit violations and their share of dependencies.
    VcExceededTable {
        exceeded: String,
        exceeded_deps: String,
        /// Series columns whose sums form the ratio denominators.
        dep_columns: Vec<String>,
        #[serde(default)]
        min_exceeded: i64,
        output: String,
    },
}

fn default_min_threads() -> usize {
    3
}

fn default_true() -> bool {
    true
}
