//! Report rendering: manifest items to artifacts.
//!
//! Walks the report manifest and materializes each item from a result
//! table into an SVG chart or a secondary CSV table in the output
//! directory. Rendering is a pure projection of the store; nothing here
//! writes back into it.

use std::fs;
use std::path::{Path, PathBuf};

use racebench_harness::read_table;
use racebench_schemas::{
    MetricRef, PhasePair, ReportSpec, ResultTable, RunRecord,
};
use tracing::info;

use crate::analytics::{
    filter_distributions, metric_value, normalize_shares, overhead_ratio,
    scalar, stacked_decomposition,
};
use crate::chart::{self, Series};
use crate::error::{ReportError, ReportErrorKind};
use crate::tables;

/// Renders every manifest item against `table`, writing artifacts into
/// `out_dir`. Items are rendered in manifest order; the first failure
/// aborts the pass.
pub fn render_reports(
    specs: &[ReportSpec],
    table: &ResultTable,
    out_dir: &Path,
) -> Result<(), ReportError> {
    fs::create_dir_all(out_dir)?;
    for spec in specs {
        let artifact = render_one(spec, table, out_dir)?;
        info!(artifact = %artifact.display(), "wrote report artifact");
    }
    Ok(())
}

fn render_one(
    spec: &ReportSpec,
    table: &ResultTable,
    out_dir: &Path,
) -> Result<PathBuf, ReportError> {
    match spec {
        ReportSpec::EventTypeBreakdown {
            counters,
            chart,
            table: table_out,
        } => {
            let svg = event_type_breakdown(table, counters)?;
            if let Some(name) = table_out {
                tables::events_table(
                    table,
                    counters,
                    &out_dir.join(name),
                )?;
            }
            write_chart(out_dir, chart, &svg)
        }
        ReportSpec::PhaseShare {
            pairs,
            min_full_ms,
            chart,
        } => {
            let svg = phase_share(table, pairs, *min_full_ms)?;
            write_chart(out_dir, chart, &svg)
        }
        ReportSpec::StackedTiming {
            cumulative,
            labels,
            min_ms,
            chart,
        } => {
            let svg = stacked_timing(table, cumulative, labels, *min_ms)?;
            write_chart(out_dir, chart, &svg)
        }
        ReportSpec::OverheadRatio {
            label,
            baseline,
            contender,
            min_baseline,
            chart,
        } => {
            let svg = overhead_chart(
                table,
                label,
                baseline,
                contender,
                *min_baseline,
            )?;
            write_chart(out_dir, chart, &svg)
        }
        ReportSpec::DepsBoxplot {
            column,
            min_sum,
            min_threads,
            chart,
        } => {
            let svg = deps_boxplot(table, column, *min_sum, *min_threads)?;
            write_chart(out_dir, chart, &svg)
        }
        ReportSpec::LimitSweep {
            metric,
            param,
            stores,
            log_x,
            chart,
        } => {
            let svg = limit_sweep(table, metric, param, stores, *log_x)?;
            write_chart(out_dir, chart, &svg)
        }
        ReportSpec::DepsTable { columns, output } => {
            let path = out_dir.join(output);
            tables::deps_table(table, columns, &path)?;
            Ok(path)
        }
        ReportSpec::TraceInfoTable {
            races,
            events,
            locks,
            output,
        } => {
            let path = out_dir.join(output);
            tables::trace_info_table(table, races, events, locks, &path)?;
            Ok(path)
        }
        ReportSpec::TimingTable {
            variants,
            min_full_ms,
            output,
        } => {
            let path = out_dir.join(output);
            tables::timing_table(table, variants, *min_full_ms, &path)?;
            Ok(path)
        }
        ReportSpec::VcExceededTable {
            exceeded,
            exceeded_deps,
            dep_columns,
            min_exceeded,
            output,
        } => {
            let path = out_dir.join(output);
            tables::vc_exceeded_table(
                table,
                exceeded,
                exceeded_deps,
                dep_columns,
                *min_exceeded,
                &path,
            )?;
            Ok(path)
        }
    }
}

fn write_chart(
    out_dir: &Path,
    name: &str,
    svg: &str,
) -> Result<PathBuf, ReportError> {
    let path = out_dir.join(name);
    fs::write(&path, svg)?;
    Ok(path)
}

fn trace_names(records: &[&RunRecord]) -> Vec<String> {
    records.iter().map(|r| r.trace_id.clone()).collect()
}

/// Horizontal stacked bar: each trace's event counters normalized to
/// percentages of the trace's event total.
fn event_type_breakdown(
    table: &ResultTable,
    counters: &[String],
) -> Result<String, ReportError> {
    let records: Vec<&RunRecord> = table.records.iter().collect();
    let mut series: Vec<Series> = counters
        .iter()
        .map(|c| Series {
            label: field_label(c),
            values: Vec::with_capacity(records.len()),
        })
        .collect();
    for record in &records {
        let counts = counters
            .iter()
            .map(|c| scalar(record, c))
            .collect::<Result<Vec<f64>, _>>()?;
        for (s, share) in series.iter_mut().zip(normalize_shares(&counts)) {
            s.values.push(share);
        }
    }
    Ok(chart::stacked_bar(&trace_names(&records), &series, "[%]", true))
}

/// Grouped bar of phase-2 time as a percentage of the full time, one bar
/// per variant per trace.
fn phase_share(
    table: &ResultTable,
    pairs: &[PhasePair],
    min_full_ms: i64,
) -> Result<String, ReportError> {
    let Some(first) = pairs.first() else {
        return Ok(chart::grouped_bar(&[], &[], "[%]"));
    };
    let mut records = Vec::new();
    for record in &table.records {
        if scalar(record, &first.full)? >= min_full_ms as f64 {
            records.push(record);
        }
    }
    let mut series = Vec::new();
    for pair in pairs {
        let mut values = Vec::with_capacity(records.len());
        for record in &records {
            let full = scalar(record, &pair.full)?;
            let phase = scalar(record, &pair.phase)?;
            if full == 0.0 {
                return Err(ReportError::new(
                    ReportErrorKind::DivisionByZero {
                        metric: pair.full.clone(),
                    },
                ));
            }
            values.push(phase / full * 100.0);
        }
        series.push(Series {
            label: pair.label.clone(),
            values,
        });
    }
    Ok(chart::grouped_bar(&trace_names(&records), &series, "[%]"))
}

/// Vertical stacked bar of the three decomposition shares per trace.
fn stacked_timing(
    table: &ResultTable,
    cumulative: &[String; 3],
    labels: &[String; 3],
    min_ms: i64,
) -> Result<String, ReportError> {
    let mut records = Vec::new();
    let mut shares = Vec::new();
    for record in &table.records {
        if scalar(record, &cumulative[0])? < min_ms as f64 {
            continue;
        }
        let timings = [
            scalar(record, &cumulative[0])?,
            scalar(record, &cumulative[1])?,
            scalar(record, &cumulative[2])?,
        ];
        shares.push(stacked_decomposition(timings)?);
        records.push(record);
    }
    let series: Vec<Series> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| Series {
            label: label.clone(),
            values: shares.iter().map(|s| s[i]).collect(),
        })
        .collect();
    Ok(chart::stacked_bar(&trace_names(&records), &series, "[%]", false))
}

/// Single-series bar of the relative overhead per trace.
fn overhead_chart(
    table: &ResultTable,
    label: &str,
    baseline: &MetricRef,
    contender: &MetricRef,
    min_baseline: f64,
) -> Result<String, ReportError> {
    let mut records = Vec::new();
    let mut values = Vec::new();
    for record in &table.records {
        let base = metric_value(record, baseline)?;
        if base <= min_baseline {
            continue;
        }
        let over = metric_value(record, contender)?;
        values.push(overhead_ratio(baseline.column(), base, over)?);
        records.push(record);
    }
    let series = [Series {
        label: label.to_string(),
        values,
    }];
    Ok(chart::grouped_bar(&trace_names(&records), &series, "overhead [%]"))
}

/// Boxplot of per-thread shares of each trace's dependency total.
fn deps_boxplot(
    table: &ResultTable,
    column: &str,
    min_sum: u64,
    min_threads: usize,
) -> Result<String, ReportError> {
    let kept = filter_distributions(table, column, min_sum, min_threads)?;
    let names: Vec<String> =
        kept.iter().map(|(n, _)| (*n).to_string()).collect();
    let data: Vec<Vec<f64>> = kept
        .iter()
        .map(|(_, series)| {
            let counts: Vec<f64> =
                series.iter().map(|&v| v as f64).collect();
            normalize_shares(&counts)
        })
        .collect();
    Ok(chart::boxplot(&names, &data, "share of dependencies [%]"))
}

/// Line chart of one metric across stores collected at different limit
/// values, one line per trace of the primary table. Traces absent from
/// any sweep store are dropped from the chart.
fn limit_sweep(
    table: &ResultTable,
    metric: &MetricRef,
    param: &str,
    stores: &[PathBuf],
    log_x: bool,
) -> Result<String, ReportError> {
    let mut sweep: Vec<(f64, ResultTable)> = Vec::with_capacity(stores.len());
    for path in stores {
        let store = read_table(path, &table.schema)?;
        let x = store
            .records
            .first()
            .and_then(|r| {
                r.config_params
                    .iter()
                    .find(|(name, _)| name == param)
                    .map(|(_, value)| *value as f64)
            })
            .ok_or_else(|| {
                ReportError::new(ReportErrorKind::MissingColumn {
                    column: param.to_string(),
                })
            })?;
        sweep.push((x, store));
    }
    sweep.sort_by(|a, b| a.0.total_cmp(&b.0));
    let xs: Vec<f64> = sweep.iter().map(|(x, _)| *x).collect();

    let mut series = Vec::new();
    for record in &table.records {
        let mut values = Vec::with_capacity(sweep.len());
        for (_, store) in &sweep {
            let Some(found) = store
                .records
                .iter()
                .find(|r| r.trace_id == record.trace_id)
            else {
                break;
            };
            values.push(metric_value(found, metric)?);
        }
        if values.len() == sweep.len() {
            series.push(Series {
                label: record.trace_id.clone(),
                values,
            });
        }
    }
    Ok(chart::line_chart(
        &xs,
        &series,
        param,
        &field_label(metric.column()),
        log_x,
    ))
}

/// Axis/legend label for a store column: the bare field name.
fn field_label(column: &str) -> String {
    column
        .rsplit('.')
        .next()
        .unwrap_or(column)
        .to_string()
}
