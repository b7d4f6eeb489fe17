//! Analysis side of the racebench pipeline.
//!
//! Reads a result store back into typed records and projects it into
//! derived artifacts: percentage and ratio analytics, secondary CSV tables
//! with fixed headers, and self-contained SVG charts. Everything here is a
//! pure function of the store; derived metrics are recomputed on every
//! pass and nothing feeds back into collection.

mod analytics;
mod chart;
mod error;
mod render;
mod tables;

pub use analytics::{
    filter_distributions, metric_value, normalize_shares, overhead_ratio,
    scalar, stacked_decomposition,
};
pub use chart::Series;
pub use error::ReportError;
pub use render::render_reports;
